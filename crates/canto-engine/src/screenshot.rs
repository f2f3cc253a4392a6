//! Back buffer capture to disk.

use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbaImage};

use crate::device::FramePixels;
use crate::error::{RenderError, RenderResult};
use crate::texture::loader::swap_red_blue;

const MAX_SCREENSHOTS: u32 = 100_000;

/// First `Screenshot_NNNNN.bmp` in `dir` that does not exist yet.
pub fn next_screenshot_path(dir: &Path) -> RenderResult<PathBuf> {
    (0..MAX_SCREENSHOTS)
        .map(|n| dir.join(format!("Screenshot_{n:05}.bmp")))
        .find(|path| !path.exists())
        .ok_or_else(|| {
            RenderError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("no free screenshot name in {}", dir.display()),
            ))
        })
}

/// Writes a BGRA frame as an opaque image; the format follows the extension.
pub fn save_frame(path: &Path, frame: &FramePixels) -> RenderResult<()> {
    let mut pixels = frame.pixels.clone();
    swap_red_blue(&mut pixels);
    for px in pixels.chunks_exact_mut(4) {
        px[3] = 255;
    }

    let image = RgbaImage::from_raw(frame.width, frame.height, pixels)
        .ok_or(RenderError::InvalidDimensions { width: frame.width, height: frame.height })?;

    let format = ImageFormat::from_path(path).unwrap_or(ImageFormat::Bmp);
    image
        .save_with_format(path, format)
        .map_err(|source| RenderError::Image { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbering_skips_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let first = next_screenshot_path(dir.path()).unwrap();
        assert_eq!(first, dir.path().join("Screenshot_00000.bmp"));

        std::fs::write(dir.path().join("Screenshot_00000.bmp"), b"x").unwrap();
        let second = next_screenshot_path(dir.path()).unwrap();
        assert_eq!(second, dir.path().join("Screenshot_00001.bmp"));
    }

    #[test]
    fn saved_frame_round_trips_colors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.bmp");
        // One blue texel, BGRA.
        let frame = FramePixels { width: 1, height: 1, pixels: vec![255, 0, 0, 0] };
        save_frame(&path, &frame).unwrap();

        let back = image::open(&path).unwrap().to_rgba8();
        assert_eq!(back.get_pixel(0, 0).0, [0, 0, 255, 255]);
    }

    #[test]
    fn short_frame_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let frame = FramePixels { width: 4, height: 4, pixels: vec![0; 8] };
        assert!(save_frame(&dir.path().join("bad.bmp"), &frame).is_err());
    }
}
