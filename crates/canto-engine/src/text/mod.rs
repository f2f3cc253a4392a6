//! Text rasterized into textures.
//!
//! Strings are laid out and rasterized with fontdue into white-on-transparent
//! images, uploaded once and drawn as ordinary tinted textures.

mod cache;
mod font_system;

pub use cache::{TextCache, TextEntry};
pub use font_system::{FontError, FontId, FontSystem, TextBitmap};
