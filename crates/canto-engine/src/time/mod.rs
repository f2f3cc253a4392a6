//! Frame timing.
//!
//! - [`FrameClock`]: per-frame delta, elapsed time and smoothed fps
//! - [`FramePacer`]: frame-rate cap when vsync is off

mod frame_clock;
mod pacer;

pub use frame_clock::{FrameClock, FrameTime};
pub use pacer::FramePacer;
