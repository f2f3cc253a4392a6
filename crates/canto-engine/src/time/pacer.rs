use std::time::{Duration, Instant};

/// Decides when the next frame may start.
///
/// With vsync the swap chain paces the loop and every redraw is allowed
/// immediately. Without it, frames are spaced by a cycle of `1 / max_fps`
/// seconds measured from the start of the previous frame.
#[derive(Debug, Clone)]
pub struct FramePacer {
    cycle: Option<Duration>,
    frame_start: Option<Instant>,
}

impl FramePacer {
    /// `max_fps == 0` disables the limit.
    pub fn new(vsync: bool, max_fps: u32) -> Self {
        let cycle = (!vsync && max_fps > 0).then(|| Duration::from_secs(1) / max_fps);
        Self { cycle, frame_start: None }
    }

    pub fn cycle(&self) -> Option<Duration> {
        self.cycle
    }

    /// Marks the start of a frame.
    pub fn begin_frame(&mut self, now: Instant) {
        self.frame_start = Some(now);
    }

    /// Earliest start of the next frame, or `None` to redraw right away.
    pub fn next_deadline(&self) -> Option<Instant> {
        Some(self.frame_start? + self.cycle?)
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next_deadline().is_none_or(|deadline| now >= deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vsync_never_waits() {
        let mut pacer = FramePacer::new(true, 60);
        let now = Instant::now();
        pacer.begin_frame(now);
        assert_eq!(pacer.cycle(), None);
        assert_eq!(pacer.next_deadline(), None);
        assert!(pacer.is_due(now));
    }

    #[test]
    fn cycle_follows_max_fps() {
        let mut pacer = FramePacer::new(false, 50);
        assert_eq!(pacer.cycle(), Some(Duration::from_millis(20)));

        let t0 = Instant::now();
        assert!(pacer.is_due(t0));
        pacer.begin_frame(t0);
        assert_eq!(pacer.next_deadline(), Some(t0 + Duration::from_millis(20)));
        assert!(!pacer.is_due(t0 + Duration::from_millis(19)));
        assert!(pacer.is_due(t0 + Duration::from_millis(20)));
    }

    #[test]
    fn zero_max_fps_is_unlimited() {
        let mut pacer = FramePacer::new(false, 0);
        pacer.begin_frame(Instant::now());
        assert_eq!(pacer.next_deadline(), None);
    }
}
