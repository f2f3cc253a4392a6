//! Renderer configuration.

use crate::coords::ColorRgba;

/// Multisample antialiasing request.
///
/// The device manager downgrades an unsupported mode to `None`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum AntiAliasing {
    #[default]
    None,
    X2,
    X4,
    X8,
    X16,
    X32,
}

impl AntiAliasing {
    /// Sample count requested from the backend. `X32` is capped at 16.
    pub fn samples(self) -> u32 {
        match self {
            AntiAliasing::None => 1,
            AntiAliasing::X2 => 2,
            AntiAliasing::X4 => 4,
            AntiAliasing::X8 => 8,
            AntiAliasing::X16 | AntiAliasing::X32 => 16,
        }
    }

    pub fn from_samples(samples: u32) -> Self {
        match samples {
            0 | 1 => AntiAliasing::None,
            2 => AntiAliasing::X2,
            3 | 4 => AntiAliasing::X4,
            5..=8 => AntiAliasing::X8,
            9..=16 => AntiAliasing::X16,
            _ => AntiAliasing::X32,
        }
    }
}

/// Upper bound applied to the longer axis of images loaded from disk.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum TextureQuality {
    Lowest,
    Low,
    #[default]
    Medium,
    High,
    Highest,
}

impl TextureQuality {
    pub fn max_size(self) -> u32 {
        match self {
            TextureQuality::Lowest => 128,
            TextureQuality::Low => 256,
            TextureQuality::Medium => 512,
            TextureQuality::High => 1024,
            TextureQuality::Highest => 2048,
        }
    }
}

/// Renderer settings.
///
/// `render_width`/`render_height` is the logical drawing area; the window
/// viewport is letterboxed to its aspect ratio.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub render_width: u32,
    pub render_height: u32,

    pub anti_aliasing: AntiAliasing,
    pub vsync: bool,
    /// Frame cap used when vsync is off.
    pub max_fps: u32,
    pub fullscreen: bool,

    pub texture_quality: TextureQuality,
    /// Quads buffered before an implicit flush.
    pub batch_quads: usize,
    /// Size of the texture handle pool.
    pub texture_capacity: usize,

    pub z_near: f32,
    pub z_far: f32,
    pub clear_color: ColorRgba,

    /// Frames a cached text texture may stay unused before it is released.
    pub text_cache_frames: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            render_width: 1280,
            render_height: 720,
            anti_aliasing: AntiAliasing::None,
            vsync: true,
            max_fps: 60,
            fullscreen: false,
            texture_quality: TextureQuality::Medium,
            batch_quads: 10_000,
            texture_capacity: 100_000,
            z_near: -100.0,
            z_far: 100.0,
            clear_color: ColorRgba::black(),
            text_cache_frames: 120,
        }
    }
}

impl RendererConfig {
    pub fn aspect(&self) -> f32 {
        self.render_width.max(1) as f32 / self.render_height.max(1) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x32_caps_at_sixteen_samples() {
        assert_eq!(AntiAliasing::X32.samples(), 16);
        assert_eq!(AntiAliasing::from_samples(4), AntiAliasing::X4);
        assert_eq!(AntiAliasing::from_samples(1), AntiAliasing::None);
    }

    #[test]
    fn quality_tiers() {
        assert_eq!(TextureQuality::default().max_size(), 512);
        assert_eq!(TextureQuality::Highest.max_size(), 2048);
    }
}
