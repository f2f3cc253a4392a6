//! Backend without a GPU.
//!
//! Records every call, keeps texture memory (with a padded row pitch) and a
//! clear-colored back buffer, and lets callers script failures. Used by the
//! engine's tests and by tools that need the renderer without a window.

use std::collections::{HashMap, VecDeque};

use glam::Mat4;

use super::host::{DisplayBounds, WindowHost};
use super::{
    DeviceCaps, FramePixels, GpuBackend, GpuTextureId, LockedRect, PresentParams, PresentResult,
    RenderState, TransformKind, VertexProcessing,
};
use crate::coords::{ColorRgba, ViewportRect};
use crate::error::DeviceError;
use crate::render::Vertex;

const ROW_ALIGN: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateDevice(VertexProcessing),
    Reset,
    ReleaseDevice,
    CreateGeometry { vertex_capacity: usize },
    ReleaseGeometry,
    SetRenderState(RenderState),
    SetViewport(ViewportRect),
    SetTransform(TransformKind, Mat4),
    CreateTexture(GpuTextureId),
    DestroyTexture(GpuTextureId),
    SetTexture(Option<GpuTextureId>),
    WriteVertices(usize),
    DrawQuad(u32),
    Clear,
    BeginScene,
    EndScene,
    Present(PresentResult),
    ReadBack,
}

/// One recorded draw with the state bound when it was issued.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessDraw {
    pub texture: Option<GpuTextureId>,
    pub world: Mat4,
    pub vertices: [Vertex; 4],
}

#[derive(Debug)]
struct HeadlessTexture {
    width: u32,
    pitch: usize,
    data: Vec<u8>,
}

#[derive(Debug)]
pub struct HeadlessBackend {
    pub caps: DeviceCaps,
    /// Highest sample count reported as supported.
    pub max_samples: u32,
    pub fail_device_creation: bool,
    pub fail_render_states: bool,

    params: Option<PresentParams>,
    processing: Option<VertexProcessing>,
    geometry: Option<usize>,
    textures: HashMap<GpuTextureId, HeadlessTexture>,
    next_texture: u64,

    vertices: Vec<Vertex>,
    bound: Option<GpuTextureId>,
    world: Mat4,
    draws: Vec<HeadlessDraw>,
    back_buffer: Vec<u8>,
    in_scene: bool,

    present_script: VecDeque<PresentResult>,
    calls: Vec<Call>,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new(DeviceCaps::default())
    }
}

impl HeadlessBackend {
    pub fn new(caps: DeviceCaps) -> Self {
        Self {
            caps,
            max_samples: 4,
            fail_device_creation: false,
            fail_render_states: false,
            params: None,
            processing: None,
            geometry: None,
            textures: HashMap::new(),
            next_texture: 1,
            vertices: Vec::new(),
            bound: None,
            world: Mat4::IDENTITY,
            draws: Vec::new(),
            back_buffer: Vec::new(),
            in_scene: false,
            present_script: VecDeque::new(),
            calls: Vec::new(),
        }
    }

    /// Makes the next `present` return `result`. Results queue up in order.
    pub fn script_present(&mut self, result: PresentResult) {
        self.present_script.push_back(result);
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    /// Draws issued since the last `begin_scene`.
    pub fn draws(&self) -> &[HeadlessDraw] {
        &self.draws
    }

    pub fn params(&self) -> Option<&PresentParams> {
        self.params.as_ref()
    }

    pub fn vertex_processing(&self) -> Option<VertexProcessing> {
        self.processing
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn has_texture(&self, id: GpuTextureId) -> bool {
        self.textures.contains_key(&id)
    }

    /// Allocated size of a texture.
    pub fn texture_size(&self, id: GpuTextureId) -> Option<(u32, u32)> {
        self.textures.get(&id).map(|t| (t.width, (t.data.len() / t.pitch) as u32))
    }

    /// Top-left `width` x `height` texels, tightly packed.
    pub fn read_texture(&self, id: GpuTextureId, width: u32, height: u32) -> Option<Vec<u8>> {
        let tex = self.textures.get(&id)?;
        let row = 4 * width as usize;
        let mut out = Vec::with_capacity(row * height as usize);
        for y in 0..height as usize {
            let start = y * tex.pitch;
            out.extend_from_slice(tex.data.get(start..start + row)?);
        }
        Some(out)
    }

    fn device(&self) -> Result<&PresentParams, DeviceError> {
        self.params.as_ref().ok_or(DeviceError::NotInitialized)
    }

    fn fill_back_buffer(&mut self, color: ColorRgba) {
        let Some(params) = self.params else { return };
        let c = color.clamp_max().to_argb(1.0).to_le_bytes();
        let texels = params.back_buffer_width as usize * params.back_buffer_height as usize;
        self.back_buffer.clear();
        for _ in 0..texels {
            self.back_buffer.extend_from_slice(&c);
        }
    }
}

impl GpuBackend for HeadlessBackend {
    fn probe(&mut self) -> Result<DeviceCaps, DeviceError> {
        Ok(self.caps)
    }

    fn supports_multisample(&self, samples: u32, _windowed: bool) -> bool {
        samples <= self.max_samples
    }

    fn create_device(
        &mut self,
        params: &PresentParams,
        processing: VertexProcessing,
    ) -> Result<(), DeviceError> {
        self.calls.push(Call::CreateDevice(processing));
        if self.fail_device_creation {
            return Err(DeviceError::CreationFailed("scripted failure".into()));
        }
        self.params = Some(*params);
        self.processing = Some(processing);
        self.fill_back_buffer(ColorRgba::black());
        Ok(())
    }

    fn reset(&mut self, params: &PresentParams) -> Result<(), DeviceError> {
        self.device()?;
        self.calls.push(Call::Reset);
        self.params = Some(*params);
        self.textures.clear();
        self.geometry = None;
        self.bound = None;
        self.fill_back_buffer(ColorRgba::black());
        Ok(())
    }

    fn release_device(&mut self) {
        self.calls.push(Call::ReleaseDevice);
        self.params = None;
        self.textures.clear();
        self.geometry = None;
    }

    fn create_geometry(
        &mut self,
        vertex_capacity: usize,
        indices: &[u16],
    ) -> Result<(), DeviceError> {
        self.device()?;
        if indices.len() != 6 {
            return Err(DeviceError::call("create_geometry", "expected six indices"));
        }
        self.calls.push(Call::CreateGeometry { vertex_capacity });
        self.geometry = Some(vertex_capacity);
        Ok(())
    }

    fn release_geometry(&mut self) {
        self.calls.push(Call::ReleaseGeometry);
        self.geometry = None;
    }

    fn set_render_state(&mut self, state: RenderState) -> Result<(), DeviceError> {
        self.device()?;
        self.calls.push(Call::SetRenderState(state));
        if self.fail_render_states {
            return Err(DeviceError::call("set_render_state", format!("{state:?} rejected")));
        }
        Ok(())
    }

    fn set_viewport(&mut self, viewport: ViewportRect) -> Result<(), DeviceError> {
        self.device()?;
        self.calls.push(Call::SetViewport(viewport));
        Ok(())
    }

    fn set_transform(&mut self, kind: TransformKind, matrix: Mat4) -> Result<(), DeviceError> {
        self.device()?;
        self.calls.push(Call::SetTransform(kind, matrix));
        if kind == TransformKind::World {
            self.world = matrix;
        }
        Ok(())
    }

    fn create_texture(&mut self, width: u32, height: u32) -> Result<GpuTextureId, DeviceError> {
        self.device()?;
        let max = self.caps.max_texture_size;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(DeviceError::call("create_texture", format!("bad size {width}x{height}")));
        }

        let id = GpuTextureId(self.next_texture);
        self.next_texture += 1;

        let pitch = (4 * width as usize).next_multiple_of(ROW_ALIGN);
        let data = vec![0; pitch * height as usize];
        self.textures.insert(id, HeadlessTexture { width, pitch, data });
        self.calls.push(Call::CreateTexture(id));
        Ok(id)
    }

    fn lock_texture(&mut self, id: GpuTextureId) -> Result<LockedRect<'_>, DeviceError> {
        let tex = self.textures.get_mut(&id).ok_or(DeviceError::UnknownTexture(id.0))?;
        Ok(LockedRect { data: &mut tex.data, pitch: tex.pitch })
    }

    fn unlock_texture(&mut self, id: GpuTextureId) -> Result<(), DeviceError> {
        if self.textures.contains_key(&id) {
            Ok(())
        } else {
            Err(DeviceError::UnknownTexture(id.0))
        }
    }

    fn destroy_texture(&mut self, id: GpuTextureId) -> Result<(), DeviceError> {
        self.calls.push(Call::DestroyTexture(id));
        self.textures.remove(&id).map(|_| ()).ok_or(DeviceError::UnknownTexture(id.0))
    }

    fn set_texture(&mut self, id: Option<GpuTextureId>) -> Result<(), DeviceError> {
        self.device()?;
        if let Some(id) = id
            && !self.textures.contains_key(&id)
        {
            return Err(DeviceError::UnknownTexture(id.0));
        }
        self.calls.push(Call::SetTexture(id));
        self.bound = id;
        Ok(())
    }

    fn write_vertices(&mut self, vertices: &[Vertex]) -> Result<(), DeviceError> {
        let capacity =
            self.geometry.ok_or(DeviceError::call("write_vertices", "no vertex buffer"))?;
        if vertices.len() > capacity {
            return Err(DeviceError::call("write_vertices", "vertex buffer overflow"));
        }
        self.calls.push(Call::WriteVertices(vertices.len()));
        self.vertices.clear();
        self.vertices.extend_from_slice(vertices);
        Ok(())
    }

    fn draw_quad(&mut self, base_vertex: u32) -> Result<(), DeviceError> {
        let base = base_vertex as usize;
        let quad: [Vertex; 4] = self
            .vertices
            .get(base..base + 4)
            .and_then(|s| s.try_into().ok())
            .ok_or(DeviceError::call("draw_quad", "base vertex out of range"))?;
        self.calls.push(Call::DrawQuad(base_vertex));
        self.draws.push(HeadlessDraw { texture: self.bound, world: self.world, vertices: quad });
        Ok(())
    }

    fn clear(&mut self, color: ColorRgba) -> Result<(), DeviceError> {
        self.device()?;
        self.calls.push(Call::Clear);
        self.fill_back_buffer(color);
        Ok(())
    }

    fn begin_scene(&mut self) -> Result<(), DeviceError> {
        self.device()?;
        if self.in_scene {
            return Err(DeviceError::call("begin_scene", "scene already open"));
        }
        self.calls.push(Call::BeginScene);
        self.in_scene = true;
        self.draws.clear();
        Ok(())
    }

    fn end_scene(&mut self) -> Result<(), DeviceError> {
        self.device()?;
        if !self.in_scene {
            return Err(DeviceError::call("end_scene", "no open scene"));
        }
        self.calls.push(Call::EndScene);
        self.in_scene = false;
        Ok(())
    }

    fn present(&mut self) -> PresentResult {
        let result = if self.params.is_none() {
            PresentResult::Failed
        } else {
            self.present_script.pop_front().unwrap_or(PresentResult::Ok)
        };
        self.calls.push(Call::Present(result));
        result
    }

    fn read_back_buffer(&mut self) -> Result<FramePixels, DeviceError> {
        let params = *self.device()?;
        self.calls.push(Call::ReadBack);
        Ok(FramePixels {
            width: params.back_buffer_width,
            height: params.back_buffer_height,
            pixels: self.back_buffer.clone(),
        })
    }
}

/// In-memory window for fullscreen tests.
#[derive(Debug, Clone)]
pub struct HeadlessWindow {
    pub size: (u32, u32),
    pub position: (i32, i32),
    pub decorated: bool,
    pub display: Option<DisplayBounds>,
    pub centered: bool,
}

impl HeadlessWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            position: (0, 0),
            decorated: true,
            display: Some(DisplayBounds { x: 0, y: 0, width: 1920, height: 1080 }),
            centered: false,
        }
    }
}

impl WindowHost for HeadlessWindow {
    fn client_size(&self) -> (u32, u32) {
        self.size
    }

    fn set_client_size(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn display_bounds(&self) -> Option<DisplayBounds> {
        self.display
    }

    fn set_position(&mut self, x: i32, y: i32) {
        self.position = (x, y);
        self.centered = false;
    }

    fn set_decorated(&mut self, decorated: bool) {
        self.decorated = decorated;
    }

    fn center(&mut self) {
        self.centered = true;
    }
}
