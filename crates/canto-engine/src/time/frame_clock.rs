use std::time::{Duration, Instant};

/// Frame timing snapshot handed to the application each frame.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Seconds since the previous tick, clamped.
    pub dt: f32,

    /// Seconds since the clock was created.
    pub elapsed: f32,

    /// Monotonic timestamp taken at the tick.
    pub now: Instant,

    /// Monotonic frame counter.
    pub frame_index: u64,

    /// Smoothed frames per second.
    pub fps: f32,
}

/// Produces [`FrameTime`] snapshots for the render loop.
///
/// Delta time is clamped so a stalled or minimized window does not hand the
/// update phase a huge step.
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
    last: Instant,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,
    fps: f32,
}

/// Weight of the newest sample in the fps average.
const FPS_SMOOTHING: f32 = 0.1;

impl FrameClock {
    pub fn new() -> Self {
        Self::with_clamps(Duration::from_micros(100), Duration::from_millis(250))
    }

    pub fn with_clamps(dt_min: Duration, dt_max: Duration) -> Self {
        debug_assert!(dt_min <= dt_max);
        let now = Instant::now();
        Self { start: now, last: now, frame_index: 0, dt_min, dt_max, fps: 0.0 }
    }

    /// Resets the delta baseline, e.g. after a device reset or a resume.
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    /// [`tick`](Self::tick) with an explicit timestamp.
    pub fn tick_at(&mut self, now: Instant) -> FrameTime {
        let dt = now.saturating_duration_since(self.last).clamp(self.dt_min, self.dt_max);
        self.last = now;

        let dt = dt.as_secs_f32();
        let instant_fps = 1.0 / dt;
        self.fps = if self.frame_index == 0 {
            instant_fps
        } else {
            self.fps + (instant_fps - self.fps) * FPS_SMOOTHING
        };

        let ft = FrameTime {
            dt,
            elapsed: now.saturating_duration_since(self.start).as_secs_f32(),
            now,
            frame_index: self.frame_index,
            fps: self.fps,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
        ft
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_is_clamped() {
        let mut clock = FrameClock::new();
        let t0 = clock.last;

        let ft = clock.tick_at(t0 + Duration::from_secs(5));
        assert_eq!(ft.frame_index, 0);
        assert!((ft.dt - 0.25).abs() < 1e-6);

        let ft = clock.tick_at(t0 + Duration::from_secs(5));
        assert_eq!(ft.frame_index, 1);
        assert!((ft.dt - 0.0001).abs() < 1e-6);
    }

    #[test]
    fn fps_settles_on_steady_rate() {
        let mut clock = FrameClock::new();
        let mut t = clock.last;
        let mut ft = clock.tick_at(t);
        for _ in 0..200 {
            t += Duration::from_millis(20);
            ft = clock.tick_at(t);
        }
        assert!((ft.fps - 50.0).abs() < 0.5, "fps {}", ft.fps);
    }
}
