//! Coordinate and geometry types shared by the renderer and its callers.
//!
//! Canonical CPU space:
//! - Render-area pixels (the fixed logical resolution, not the window size)
//! - Origin top-left
//! - +X right, +Y down
//!
//! The renderer flips Y and applies the half-pixel shift when it builds
//! device-space vertices; callers never see device space.

mod color;
mod rect;
mod viewport;

pub use color::ColorRgba;
pub use rect::{DrawRect, Rect};
pub use viewport::ViewportRect;
