//! Canto engine crate.
//!
//! Immediate-mode 2D renderer for a karaoke game: a recycling texture pool
//! fed from any thread, a batched textured-quad renderer with clipping,
//! rotation and reflections, and a device lifecycle that survives device
//! loss, resizes and fullscreen switches.

pub mod config;
pub mod coords;
pub mod core;
pub mod device;
pub mod error;
pub mod logging;
pub mod render;
pub mod screenshot;
pub mod text;
pub mod texture;
pub mod time;
pub mod window;

pub use config::{AntiAliasing, RendererConfig, TextureQuality};
pub use error::{DeviceError, RenderError, RenderResult};
pub use render::{DrawParams, FrameOutcome, Renderer};
pub use texture::{TextureHandle, TextureStore};
