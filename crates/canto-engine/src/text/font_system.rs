use std::path::Path;

use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};
use glam::Vec2;
use thiserror::Error;

/// Error returned by [`FontSystem::load_font`] and
/// [`FontSystem::load_font_file`].
#[derive(Debug, Error)]
pub enum FontError {
    #[error("cannot read font file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse font: {0}")]
    Parse(String),
}

/// Opaque handle to a font loaded into a [`FontSystem`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct FontId(pub(crate) usize);

/// White-on-transparent text image, BGRA8.
#[derive(Debug, Clone)]
pub struct TextBitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Owns the loaded fonts. Fonts are immutable after loading.
pub struct FontSystem {
    fonts: Vec<fontdue::Font>,
}

impl FontSystem {
    pub fn new() -> Self {
        Self { fonts: Vec::new() }
    }

    /// Parses a TrueType or OpenType font from raw bytes.
    pub fn load_font(&mut self, bytes: &[u8]) -> Result<FontId, FontError> {
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|e| FontError::Parse(e.to_string()))?;
        let id = FontId(self.fonts.len());
        self.fonts.push(font);
        Ok(id)
    }

    pub fn load_font_file(&mut self, path: &Path) -> Result<FontId, FontError> {
        let bytes = std::fs::read(path)?;
        self.load_font(&bytes)
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    fn get(&self, id: FontId) -> Option<&fontdue::Font> {
        self.fonts.get(id.0)
    }

    fn layout(&self, font: &fontdue::Font, text: &str, px: f32) -> Layout<()> {
        let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings::default());
        layout.append(&[font], &TextStyle::new(text, px, 0));
        layout
    }

    /// Size of `text` set at `px` pixels: pen advance by line height.
    #[must_use]
    pub fn measure(&self, text: &str, id: FontId, px: f32) -> Vec2 {
        let Some(font) = self.get(id) else {
            return Vec2::new(0.0, px);
        };

        let layout = self.layout(font, text, px);
        let glyphs = layout.glyphs();
        let width = glyphs
            .iter()
            .map(|g| {
                let m = font.metrics_indexed(g.key.glyph_index, px);
                (g.x - m.xmin as f32 + m.advance_width).max(0.0)
            })
            .fold(0.0f32, f32::max);
        let height = layout.height().max(px);
        Vec2::new(width, height)
    }

    /// Rasterizes `text` into a bitmap of its measured size. `None` for an
    /// unknown font or a string without visible extent.
    pub fn rasterize(&self, text: &str, id: FontId, px: f32) -> Option<TextBitmap> {
        let font = self.get(id)?;
        let size = self.measure(text, id, px);
        let width = size.x.ceil() as u32;
        let height = size.y.ceil() as u32;
        if width == 0 || height == 0 {
            return None;
        }

        let mut coverage = vec![0u8; width as usize * height as usize];
        let layout = self.layout(font, text, px);
        for g in layout.glyphs() {
            if g.width == 0 || g.height == 0 {
                continue;
            }
            let (metrics, bitmap) = font.rasterize_indexed(g.key.glyph_index, g.key.px);
            let ox = g.x.round() as i64;
            let oy = g.y.round() as i64;
            for row in 0..metrics.height {
                let y = oy + row as i64;
                if y < 0 || y >= height as i64 {
                    continue;
                }
                for col in 0..metrics.width {
                    let x = ox + col as i64;
                    if x < 0 || x >= width as i64 {
                        continue;
                    }
                    let dst = &mut coverage[y as usize * width as usize + x as usize];
                    *dst = (*dst).max(bitmap[row * metrics.width + col]);
                }
            }
        }

        let pixels = coverage.iter().flat_map(|&a| [255, 255, 255, a]).collect();
        Some(TextBitmap { width, height, pixels })
    }
}

impl Default for FontSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_font_measures_to_line_height() {
        let fonts = FontSystem::new();
        assert_eq!(fonts.measure("abc", FontId(3), 20.0), Vec2::new(0.0, 20.0));
        assert!(fonts.rasterize("abc", FontId(3), 20.0).is_none());
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        let mut fonts = FontSystem::new();
        assert!(matches!(fonts.load_font(b"not a font"), Err(FontError::Parse(_))));
        assert!(fonts.is_empty());
    }

    #[test]
    fn missing_font_file_is_io_error() {
        let mut fonts = FontSystem::new();
        let err = fonts.load_font_file(Path::new("no/such/font.ttf")).unwrap_err();
        assert!(matches!(err, FontError::Io(_)));
    }
}
