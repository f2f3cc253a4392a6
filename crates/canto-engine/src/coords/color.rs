/// Straight-alpha RGBA color with components nominally in `[0, 1]`.
///
/// Used as the tint of a draw call: the sampled texel is multiplied by this
/// color, then alpha-blended with source-alpha / inverse-source-alpha.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ColorRgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Default for ColorRgba {
    fn default() -> Self {
        Self::white()
    }
}

impl ColorRgba {
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    pub const fn black() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }

    #[inline]
    pub const fn white() -> Self {
        Self::new(1.0, 1.0, 1.0, 1.0)
    }

    #[inline]
    pub fn from_u8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, a as f32 / 255.0)
    }

    #[inline]
    pub const fn with_alpha(mut self, a: f32) -> Self {
        self.a = a;
        self
    }

    /// Caps every component at 1. Values below 0 are left alone; the byte
    /// conversion in [`to_argb`](Self::to_argb) saturates them.
    #[inline]
    pub fn clamp_max(self) -> Self {
        Self::new(self.r.min(1.0), self.g.min(1.0), self.b.min(1.0), self.a.min(1.0))
    }

    /// Packs into a `0xAARRGGBB` word, scaling alpha by `alpha_scale`.
    ///
    /// Components are truncated, not rounded (`0.5 * 255` becomes `127`).
    #[inline]
    pub fn to_argb(self, alpha_scale: f32) -> u32 {
        let a = (self.a * 255.0 * alpha_scale) as u8;
        let r = (self.r * 255.0) as u8;
        let g = (self.g * 255.0) as u8;
        let b = (self.b * 255.0) as u8;
        u32::from_be_bytes([a, r, g, b])
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite() && self.a.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argb_packing_order() {
        let c = ColorRgba::new(1.0, 0.0, 0.0, 1.0);
        assert_eq!(c.to_argb(1.0), 0xFFFF_0000);
        let c = ColorRgba::new(0.0, 0.0, 1.0, 0.5);
        assert_eq!(c.to_argb(1.0), 0x7F00_00FF);
    }

    #[test]
    fn alpha_scale_applies_to_alpha_only() {
        let c = ColorRgba::white();
        assert_eq!(c.to_argb(0.0), 0x00FF_FFFF);
    }

    #[test]
    fn out_of_range_components_saturate() {
        let c = ColorRgba::new(2.0, -1.0, 0.0, 1.0);
        assert_eq!(c.to_argb(1.0), 0xFFFF_0000);
        assert_eq!(c.clamp_max().r, 1.0);
        assert_eq!(c.clamp_max().g, -1.0);
    }
}
