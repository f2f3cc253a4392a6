//! Batched quad rendering.
//!
//! Convention:
//! - Draw coordinates are render-area pixels (top-left origin, +Y down).
//! - Quads are built on the CPU with the half-pixel shift and Y flip, and
//!   sent through the device projection and world transforms.

mod batch;
pub mod geometry;
mod renderer;
mod vertex;

pub use batch::QuadBatch;
pub use geometry::UvExtent;
pub use renderer::{DrawParams, FrameOutcome, Renderer};
pub use vertex::{Vertex, QUAD_INDICES, VERTICES_PER_QUAD};
