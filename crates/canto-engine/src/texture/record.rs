use std::path::PathBuf;

use super::TextureHandle;
use crate::coords::{ColorRgba, DrawRect};

/// Metadata for one texture; survives GPU object recreation.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureRecord {
    pub handle: TextureHandle,
    pub width: u32,
    pub height: u32,
    pub padded_width: u32,
    pub padded_height: u32,
    /// `width / padded_width`; the U coordinate of the texture's right edge.
    pub width_ratio: f32,
    /// `height / padded_height`; the V coordinate of the texture's bottom edge.
    pub height_ratio: f32,
    /// Default destination used by `draw_texture(handle)`.
    pub rect: DrawRect,
    /// Default tint.
    pub color: ColorRgba,
    pub path: Option<PathBuf>,
    pub(crate) serial: u64,
}

impl TextureRecord {
    pub(crate) fn new(
        handle: TextureHandle,
        width: u32,
        height: u32,
        non_pow2: bool,
        serial: u64,
    ) -> Self {
        let (padded_width, padded_height) = padded_extent(width, height, non_pow2);
        Self {
            handle,
            width,
            height,
            padded_width,
            padded_height,
            width_ratio: width as f32 / padded_width as f32,
            height_ratio: height as f32 / padded_height as f32,
            rect: DrawRect::new(0.0, 0.0, width as f32, height as f32),
            color: ColorRgba::white(),
            path: None,
            serial,
        }
    }
}

/// GPU allocation size for a `width` x `height` image.
///
/// Without non-power-of-two support each axis is rounded up to the next
/// power of two; otherwise the size passes through.
pub fn padded_extent(width: u32, height: u32, non_pow2: bool) -> (u32, u32) {
    if non_pow2 {
        (width, height)
    } else {
        (width.next_power_of_two(), height.next_power_of_two())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_to_smallest_power_of_two() {
        for (w, h) in [(1, 1), (3, 5), (100, 64), (257, 1000), (1024, 1025)] {
            let (pw, ph) = padded_extent(w, h, false);
            assert!(pw.is_power_of_two() && ph.is_power_of_two());
            assert!(pw >= w && pw / 2 < w);
            assert!(ph >= h && ph / 2 < h);
        }
    }

    #[test]
    fn passthrough_with_non_pow2_support() {
        assert_eq!(padded_extent(100, 30, true), (100, 30));
    }

    #[test]
    fn ratios_follow_padding() {
        let r = TextureRecord::new(TextureHandle(0), 100, 64, false, 0);
        assert_eq!((r.padded_width, r.padded_height), (128, 64));
        assert_eq!(r.width_ratio, 100.0 / 128.0);
        assert_eq!(r.height_ratio, 1.0);
        assert_eq!(r.rect, DrawRect::new(0.0, 0.0, 100.0, 64.0));
    }
}
