/// Device viewport in window (back buffer) pixels.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ViewportRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ViewportRect {
    #[inline]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Fits a viewport of the given `aspect` (width / height) into a client
    /// area, shrinking whichever dimension overflows and centring the result.
    pub fn letterbox(client_width: u32, client_height: u32, aspect: f32) -> Self {
        let cw = client_width.max(1);
        let ch = client_height.max(1);

        if cw as f32 / ch as f32 > aspect {
            // Too wide: pillarbox.
            let w = ((ch as f32 * aspect).round() as u32).min(cw);
            Self::new((cw - w) / 2, 0, w, ch)
        } else {
            // Too tall: letterbox.
            let h = ((cw as f32 / aspect).round() as u32).min(ch);
            Self::new(0, (ch - h) / 2, cw, h)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDE: f32 = 16.0 / 9.0;

    #[test]
    fn exact_aspect_fills_client() {
        assert_eq!(ViewportRect::letterbox(1280, 720, WIDE), ViewportRect::new(0, 0, 1280, 720));
    }

    #[test]
    fn tall_client_is_letterboxed() {
        assert_eq!(ViewportRect::letterbox(1920, 1200, WIDE), ViewportRect::new(0, 60, 1920, 1080));
    }

    #[test]
    fn wide_client_is_pillarboxed() {
        assert_eq!(ViewportRect::letterbox(2000, 720, WIDE), ViewportRect::new(360, 0, 1280, 720));
    }

    #[test]
    fn zero_client_does_not_divide_by_zero() {
        assert!(ViewportRect::letterbox(0, 0, WIDE).is_valid());
    }
}
