/// Axis-aligned rectangle in render-area pixels (top-left origin).
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    #[inline]
    pub fn right(self) -> f32 {
        self.x + self.w
    }

    #[inline]
    pub fn bottom(self) -> f32 {
        self.y + self.h
    }

    #[inline]
    pub fn center(self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.w <= 0.0 || self.h <= 0.0
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.w.is_finite() && self.h.is_finite()
    }

    /// Normalizes the rectangle so width/height are non-negative.
    #[inline]
    pub fn normalized(self) -> Self {
        let (mut x, mut y, mut w, mut h) = (self.x, self.y, self.w, self.h);

        if w < 0.0 {
            x += w;
            w = -w;
        }
        if h < 0.0 {
            y += h;
            h = -h;
        }

        Rect::new(x, y, w, h)
    }

    /// Half-open containment: [min, max).
    #[inline]
    pub fn contains(self, px: f32, py: f32) -> bool {
        let r = self.normalized();
        px >= r.x && py >= r.y && px < r.right() && py < r.bottom()
    }

    #[inline]
    pub fn intersect(self, other: Rect) -> Option<Rect> {
        let a = self.normalized();
        let b = other.normalized();

        let x0 = a.x.max(b.x);
        let y0 = a.y.max(b.y);
        let x1 = a.right().min(b.right());
        let y1 = a.bottom().min(b.bottom());

        if x1 - x0 <= 0.0 || y1 - y0 <= 0.0 {
            None
        } else {
            Some(Rect::new(x0, y0, x1 - x0, y1 - y0))
        }
    }
}

/// Destination rectangle for a textured quad.
///
/// `z` is passed through to the vertex position; `rotation` is in degrees,
/// clockwise on screen, pivoting on the centre of the visible (clipped) area.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct DrawRect {
    pub rect: Rect,
    pub z: f32,
    pub rotation: f32,
}

impl DrawRect {
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { rect: Rect::new(x, y, w, h), z: 0.0, rotation: 0.0 }
    }

    #[inline]
    pub const fn with_z(mut self, z: f32) -> Self {
        self.z = z;
        self
    }

    #[inline]
    pub const fn rotated(mut self, degrees: f32) -> Self {
        self.rotation = degrees;
        self
    }
}

impl From<Rect> for DrawRect {
    fn from(rect: Rect) -> Self {
        Self { rect, z: 0.0, rotation: 0.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(x: f32, y: f32, w: f32, h: f32) -> Rect { Rect::new(x, y, w, h) }

    #[test]
    fn normalized_flips_negative_extent() {
        let n = r(10.0, 10.0, -4.0, -3.0).normalized();
        assert_eq!(n, r(6.0, 7.0, 4.0, 3.0));
    }

    #[test]
    fn contains_is_half_open() {
        let rect = r(0.0, 0.0, 10.0, 10.0);
        assert!(rect.contains(0.0, 0.0));
        assert!(rect.contains(9.9, 9.9));
        assert!(!rect.contains(10.0, 10.0));
        assert!(!rect.contains(-1.0, 5.0));
    }

    #[test]
    fn intersect_overlapping() {
        let a = r(0.0, 0.0, 10.0, 10.0);
        let b = r(5.0, 5.0, 10.0, 10.0);
        assert_eq!(a.intersect(b), Some(r(5.0, 5.0, 5.0, 5.0)));
    }

    #[test]
    fn intersect_touching_edge_returns_none() {
        let a = r(0.0, 0.0, 10.0, 10.0);
        let b = r(10.0, 0.0, 10.0, 10.0);
        assert!(a.intersect(b).is_none());
    }

    #[test]
    fn center_and_edges() {
        let rect = r(10.0, 20.0, 30.0, 40.0);
        assert_eq!(rect.right(), 40.0);
        assert_eq!(rect.bottom(), 60.0);
        assert_eq!(rect.center(), (25.0, 40.0));
    }

    #[test]
    fn draw_rect_builders() {
        let d = DrawRect::new(1.0, 2.0, 3.0, 4.0).with_z(0.5).rotated(45.0);
        assert_eq!(d.rect, r(1.0, 2.0, 3.0, 4.0));
        assert_eq!(d.z, 0.5);
        assert_eq!(d.rotation, 45.0);
    }
}
