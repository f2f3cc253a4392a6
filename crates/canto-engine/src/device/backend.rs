use glam::Mat4;

use super::{DeviceCaps, PresentParams, VertexProcessing};
use crate::coords::{ColorRgba, ViewportRect};
use crate::error::DeviceError;
use crate::render::Vertex;

/// Backend-assigned identity of a GPU texture. Never reused by a backend.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuTextureId(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TransformKind {
    Projection,
    World,
}

/// Fixed-function state applied after every device (re)initialization.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RenderState {
    CullNone,
    /// Source-alpha / inverse-source-alpha blending.
    AlphaBlend,
    Lighting(bool),
    MultisampleAntialias(bool),
    /// Linear min, mag and mip filters.
    LinearFiltering,
    /// Clamp addressing on U and V.
    ClampAddressing,
    /// Output alpha is texture alpha times vertex alpha.
    ModulateAlpha,
}

/// Outcome of presenting the back buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PresentResult {
    Ok,
    /// The device must be reset before rendering continues.
    NeedsReset,
    /// Transient failure; the frame is dropped.
    Failed,
    /// The device is unusable.
    Fatal,
}

/// Writable view of a texture's memory between `lock_texture` and
/// `unlock_texture`. Rows are `pitch` bytes apart.
pub struct LockedRect<'a> {
    pub data: &'a mut [u8],
    pub pitch: usize,
}

/// Back buffer contents, BGRA8, tightly packed rows.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePixels {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// The device-level operations the renderer needs.
///
/// Every call is made from the render thread. Texture ids handed out by
/// `create_texture` stay valid until `destroy_texture`, `reset` or
/// `release_device`.
pub trait GpuBackend {
    /// Queries adapter capabilities. Called once before `create_device`.
    fn probe(&mut self) -> Result<DeviceCaps, DeviceError>;

    fn supports_multisample(&self, samples: u32, windowed: bool) -> bool;

    fn create_device(
        &mut self,
        params: &PresentParams,
        processing: VertexProcessing,
    ) -> Result<(), DeviceError>;

    /// Re-applies `params`. Invalidates every texture and the geometry.
    fn reset(&mut self, params: &PresentParams) -> Result<(), DeviceError>;

    fn release_device(&mut self);

    /// Creates the dynamic vertex buffer and the static index buffer.
    fn create_geometry(&mut self, vertex_capacity: usize, indices: &[u16])
        -> Result<(), DeviceError>;

    fn release_geometry(&mut self);

    fn set_render_state(&mut self, state: RenderState) -> Result<(), DeviceError>;
    fn set_viewport(&mut self, viewport: ViewportRect) -> Result<(), DeviceError>;
    fn set_transform(&mut self, kind: TransformKind, matrix: Mat4) -> Result<(), DeviceError>;

    fn create_texture(&mut self, width: u32, height: u32) -> Result<GpuTextureId, DeviceError>;
    fn lock_texture(&mut self, id: GpuTextureId) -> Result<LockedRect<'_>, DeviceError>;
    fn unlock_texture(&mut self, id: GpuTextureId) -> Result<(), DeviceError>;
    fn destroy_texture(&mut self, id: GpuTextureId) -> Result<(), DeviceError>;

    fn set_texture(&mut self, id: Option<GpuTextureId>) -> Result<(), DeviceError>;

    /// Replaces the vertex buffer contents. Draws that follow index into it.
    fn write_vertices(&mut self, vertices: &[Vertex]) -> Result<(), DeviceError>;

    /// Draws one quad (six indices) starting at `base_vertex`.
    fn draw_quad(&mut self, base_vertex: u32) -> Result<(), DeviceError>;

    /// Clears color and depth of the whole target.
    fn clear(&mut self, color: ColorRgba) -> Result<(), DeviceError>;
    fn begin_scene(&mut self) -> Result<(), DeviceError>;
    fn end_scene(&mut self) -> Result<(), DeviceError>;
    fn present(&mut self) -> PresentResult;

    /// Reads everything drawn so far this frame.
    fn read_back_buffer(&mut self) -> Result<FramePixels, DeviceError>;
}

/// Copies `height` rows of `4 * width` bytes from a tightly packed source
/// into `dst`, whose rows are `pitch` bytes apart.
pub fn copy_rows(dst: &mut LockedRect<'_>, src: &[u8], width: u32, height: u32) {
    let row = 4 * width as usize;
    for y in 0..height as usize {
        let from = &src[y * row..(y + 1) * row];
        let start = y * dst.pitch;
        dst.data[start..start + row].copy_from_slice(from);
    }
}

/// Creates a texture of `padded` size and fills its top-left
/// `width` x `height` area from `pixels`.
pub fn upload_texture<B: GpuBackend + ?Sized>(
    gpu: &mut B,
    padded: (u32, u32),
    width: u32,
    height: u32,
    pixels: &[u8],
) -> Result<GpuTextureId, DeviceError> {
    let id = gpu.create_texture(padded.0, padded.1)?;
    if let Err(e) = write_texture(gpu, id, width, height, pixels) {
        let _ = gpu.destroy_texture(id);
        return Err(e);
    }
    Ok(id)
}

/// Overwrites the top-left `width` x `height` area of an existing texture.
pub fn write_texture<B: GpuBackend + ?Sized>(
    gpu: &mut B,
    id: GpuTextureId,
    width: u32,
    height: u32,
    pixels: &[u8],
) -> Result<(), DeviceError> {
    {
        let mut locked = gpu.lock_texture(id)?;
        copy_rows(&mut locked, pixels, width, height);
    }
    gpu.unlock_texture(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_rows_honors_pitch() {
        let mut mem = vec![0u8; 2 * 16];
        let src: Vec<u8> = (1..=16).collect();
        let mut locked = LockedRect { data: &mut mem, pitch: 16 };
        copy_rows(&mut locked, &src, 2, 2);
        assert_eq!(&mem[0..8], &src[0..8]);
        assert_eq!(&mem[8..16], &[0; 8]);
        assert_eq!(&mem[16..24], &src[8..16]);
    }
}
