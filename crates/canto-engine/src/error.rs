//! Error types for the device seam and the renderer.
//!
//! Most failures inside the renderer are logged and converted into a
//! sentinel (`TextureHandle::INVALID`, `false`, a skipped draw). The types
//! here cover what does cross the boundary: fatal conditions and the
//! results of backend calls before they are logged.

use std::path::PathBuf;

use thiserror::Error;

use crate::device::DeviceStatus;

/// Failure reported by a [`GpuBackend`](crate::device::GpuBackend) call.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no suitable GPU adapter found")]
    NoAdapter,

    #[error("device creation failed: {0}")]
    CreationFailed(String),

    #[error("device not created")]
    NotInitialized,

    #[error("unknown GPU texture {0}")]
    UnknownTexture(u64),

    #[error("{operation} failed: {reason}")]
    CallFailed { operation: &'static str, reason: String },

    #[error("device lost")]
    Lost,

    #[error("out of GPU memory")]
    OutOfMemory,
}

impl DeviceError {
    pub fn call(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::CallFailed { operation, reason: reason.into() }
    }
}

/// Renderer-level error.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("texture handle pool exhausted (capacity {capacity})")]
    HandlesExhausted { capacity: usize },

    #[error("invalid texture dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("pixel buffer too small: expected {expected} bytes, got {actual}")]
    PixelBufferTooSmall { expected: usize, actual: usize },

    #[error("operation not allowed while device is {0:?}")]
    InvalidState(DeviceStatus),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("failed to load image {path}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// True for the conditions that leave no usable renderer: device
    /// creation failure and handle-pool exhaustion.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RenderError::HandlesExhausted { .. }
                | RenderError::Device(DeviceError::NoAdapter)
                | RenderError::Device(DeviceError::CreationFailed(_))
                | RenderError::Device(DeviceError::OutOfMemory)
        )
    }
}

pub type RenderResult<T> = Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(RenderError::HandlesExhausted { capacity: 5 }.is_fatal());
        assert!(RenderError::from(DeviceError::CreationFailed("x".into())).is_fatal());
        assert!(!RenderError::InvalidDimensions { width: 0, height: 1 }.is_fatal());
        assert!(!RenderError::from(DeviceError::call("set_render_state", "nope")).is_fatal());
    }

    #[test]
    fn call_failure_message() {
        let e = DeviceError::call("draw_quad", "buffer unmapped");
        assert_eq!(e.to_string(), "draw_quad failed: buffer unmapped");
    }
}
