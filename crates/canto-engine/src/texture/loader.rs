use std::path::Path;

use image::imageops::FilterType;
use image::ImageReader;

use crate::error::{RenderError, RenderResult};

/// Decoded image in texture byte order.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub width: u32,
    pub height: u32,
    /// BGRA8, tightly packed.
    pub pixels: Vec<u8>,
}

/// Scales `(width, height)` down so the longer axis is at most `max_size`,
/// keeping the aspect ratio. Sizes already inside the bound pass through.
pub fn fit_within(width: u32, height: u32, max_size: u32) -> (u32, u32) {
    if width <= max_size && height <= max_size {
        return (width, height);
    }

    let scale = max_size as f32 / width.max(height) as f32;
    let w = ((width as f32 * scale).round() as u32).clamp(1, max_size);
    let h = ((height as f32 * scale).round() as u32).clamp(1, max_size);
    (w, h)
}

/// Decodes `path`, downsizes it to `max_size` and converts to BGRA8.
pub fn load_bgra(path: &Path, max_size: u32) -> RenderResult<LoadedImage> {
    let image_err = |source| RenderError::Image { path: path.to_path_buf(), source };

    let decoded = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(image_err)?;

    let mut rgba = decoded.to_rgba8();
    let (width, height) = fit_within(rgba.width(), rgba.height(), max_size);
    if (width, height) != rgba.dimensions() {
        log::debug!(
            "downsizing {} from {}x{} to {width}x{height}",
            path.display(),
            rgba.width(),
            rgba.height()
        );
        rgba = image::imageops::resize(&rgba, width, height, FilterType::CatmullRom);
    }

    let mut pixels = rgba.into_raw();
    swap_red_blue(&mut pixels);
    Ok(LoadedImage { width, height, pixels })
}

/// RGBA8 <-> BGRA8 in place.
pub fn swap_red_blue(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_keeps_small_images() {
        assert_eq!(fit_within(300, 200, 512), (300, 200));
    }

    #[test]
    fn fit_preserves_aspect_on_longer_axis() {
        assert_eq!(fit_within(2048, 1024, 512), (512, 256));
        assert_eq!(fit_within(100, 1000, 128), (13, 128));
    }

    #[test]
    fn loads_png_as_bgra() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.png");
        image::RgbaImage::from_pixel(4, 2, image::Rgba([255, 0, 0, 255])).save(&path).unwrap();

        let img = load_bgra(&path, 512).unwrap();
        assert_eq!((img.width, img.height), (4, 2));
        assert_eq!(&img.pixels[0..4], &[0, 0, 255, 255]);
    }

    #[test]
    fn large_images_are_downsized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        image::RgbaImage::new(400, 100).save(&path).unwrap();

        let img = load_bgra(&path, 128).unwrap();
        assert_eq!((img.width, img.height), (128, 32));
        assert_eq!(img.pixels.len(), 128 * 32 * 4);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_bgra(Path::new("definitely/missing.png"), 512).unwrap_err();
        assert!(matches!(err, RenderError::Io(_)));
    }
}
