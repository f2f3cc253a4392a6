//! GPU device seam and lifecycle.
//!
//! - [`GpuBackend`]: the device operations the renderer needs
//! - [`DeviceManager`]: creation, capability negotiation, reset and
//!   fullscreen, driven as an explicit [`DeviceStatus`] state machine
//! - [`headless`]: recording backend without a GPU
//! - [`wgpu`](mod@self::wgpu): the windowed backend

mod backend;
mod caps;
pub mod headless;
mod host;
mod lifecycle;
mod params;
pub mod wgpu;

pub use backend::{
    copy_rows, upload_texture, write_texture, FramePixels, GpuBackend, GpuTextureId, LockedRect,
    PresentResult, RenderState, TransformKind,
};
pub use caps::{DeviceCaps, VertexProcessing};
pub use host::{DisplayBounds, WindowHost};
pub use lifecycle::{DeviceManager, DeviceStatus};
pub use params::{PresentInterval, PresentParams};
