//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and the window, and drives the renderer on
//! the wgpu backend.

mod host;
mod runtime;

pub use host::WinitHost;
pub use runtime::{Runtime, RuntimeConfig};
