//! Application-facing contracts.
//!
//! The runtime owns the window and the renderer; applications implement
//! [`App`] and act through [`FrameCtx`] and the [`Commands`] buffer.

mod app;
mod ctx;

pub use app::{run_frame, App, AppControl};
pub use ctx::{Command, Commands, FrameCtx};
