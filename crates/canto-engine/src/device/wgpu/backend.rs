use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use glam::Mat4;
use wgpu::util::DeviceExt;
use winit::window::Window;

use super::GpuInit;
use super::pipeline::{MATRIX_SIZE, MatrixUniform, QuadPipeline, align_to, create_sampler};
use super::surface::{
    choose_alpha_mode, choose_present_mode, choose_surface_format, is_rgba_order,
    map_surface_error,
};
use crate::coords::{ColorRgba, ViewportRect};
use crate::device::{
    DeviceCaps, FramePixels, GpuBackend, GpuTextureId, LockedRect, PresentParams, PresentResult,
    RenderState, TransformKind, VertexProcessing,
};
use crate::error::DeviceError;
use crate::render::Vertex;

const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Bgra8Unorm;
const READBACK_TIMEOUT: Duration = Duration::from_secs(5);

/// wgpu-backed [`GpuBackend`] drawing into a window surface.
///
/// The surface borrows the window for `'w`; the runtime keeps both in one
/// self-referencing entry.
pub struct WgpuBackend<'w> {
    init: GpuInit,
    window: &'w Window,
    instance: wgpu::Instance,
    surface: wgpu::Surface<'w>,

    adapter: Option<wgpu::Adapter>,
    surface_caps: Option<wgpu::SurfaceCapabilities>,
    format: wgpu::TextureFormat,

    gpu: Option<DeviceState>,
    next_texture_id: u64,
}

/// Everything created with the logical device.
struct DeviceState {
    device: wgpu::Device,
    queue: wgpu::Queue,
    lost: Arc<AtomicBool>,

    config: wgpu::SurfaceConfiguration,
    quad: QuadPipeline,
    sampler: wgpu::Sampler,
    msaa: Option<wgpu::TextureView>,

    projection: wgpu::Buffer,
    worlds: wgpu::Buffer,
    world_capacity: u64,
    world_stride: u64,
    globals: wgpu::BindGroup,

    geometry: Option<Geometry>,
    white: wgpu::BindGroup,
    textures: HashMap<GpuTextureId, GpuTexture>,

    viewport: ViewportRect,
    world: Mat4,
    bound: Option<GpuTextureId>,

    frame: Option<Frame>,
    clear: Option<wgpu::Color>,
    recording: Recording,
    /// Result the next present reports after a failed acquisition.
    pending_result: Option<PresentResult>,
}

struct Geometry {
    vertices: wgpu::Buffer,
    /// In vertices.
    capacity: usize,
    indices: wgpu::Buffer,
    index_count: u32,
}

struct GpuTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
    /// Lock memory; empty while unlocked.
    staging: Vec<u8>,
}

impl GpuTexture {
    fn pitch(&self) -> usize {
        align_to(4 * self.width as u64, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as u64) as usize
    }
}

struct Frame {
    texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
}

/// Draws recorded since the last encode.
#[derive(Default)]
struct Recording {
    vertices: Vec<Vertex>,
    /// Offset of the most recent `write_vertices` block.
    vertex_base: u32,
    worlds: Vec<Mat4>,
    draws: Vec<RecordedDraw>,
}

impl Recording {
    fn clear(&mut self) {
        self.vertices.clear();
        self.vertex_base = 0;
        self.worlds.clear();
        self.draws.clear();
    }
}

#[derive(Debug, Copy, Clone)]
struct RecordedDraw {
    texture: Option<GpuTextureId>,
    base_vertex: u32,
    world: usize,
}

impl<'w> WgpuBackend<'w> {
    /// Creates the instance and the window surface. The adapter and device
    /// are requested by the device lifecycle through [`GpuBackend`].
    pub fn new(window: &'w Window, init: GpuInit) -> Result<Self, DeviceError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: init.backends,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|e| DeviceError::CreationFailed(format!("surface: {e}")))?;

        Ok(Self {
            init,
            window,
            instance,
            surface,
            adapter: None,
            surface_caps: None,
            format: TEXTURE_FORMAT,
            gpu: None,
            next_texture_id: 1,
        })
    }

    pub fn window(&self) -> &'w Window {
        self.window
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn adapter_info(&self) -> Option<wgpu::AdapterInfo> {
        self.adapter.as_ref().map(|a| a.get_info())
    }

    fn state(&mut self) -> Result<&mut DeviceState, DeviceError> {
        self.gpu.as_mut().ok_or(DeviceError::NotInitialized)
    }

    fn open_device(&self, params: &PresentParams) -> Result<DeviceState, DeviceError> {
        let adapter = self.adapter.as_ref().ok_or(DeviceError::NoAdapter)?;
        let caps = self.surface_caps.as_ref().ok_or(DeviceError::NoAdapter)?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("canto device"),
            required_features: self.init.required_features,
            required_limits: self.init.required_limits.clone(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| DeviceError::CreationFailed(e.to_string()))?;

        let lost = Arc::new(AtomicBool::new(false));
        let flag = lost.clone();
        device.set_device_lost_callback(move |reason, message| {
            if !matches!(reason, wgpu::DeviceLostReason::Destroyed) {
                log::warn!("wgpu device lost ({reason:?}): {message}");
                flag.store(true, Ordering::Release);
            }
        });

        let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT;
        if caps.usages.contains(wgpu::TextureUsages::COPY_SRC) {
            usage |= wgpu::TextureUsages::COPY_SRC;
        }

        let config = wgpu::SurfaceConfiguration {
            usage,
            format: self.format,
            width: params.back_buffer_width.max(1),
            height: params.back_buffer_height.max(1),
            present_mode: choose_present_mode(caps, params.interval, self.init.vsync_present_mode),
            alpha_mode: choose_alpha_mode(caps, self.init.alpha_mode),
            view_formats: vec![],
            desired_maximum_frame_latency: self.init.desired_maximum_frame_latency,
        };
        self.surface.configure(&device, &config);

        let quad = QuadPipeline::new(&device, self.format, params.sample_count());
        let sampler = create_sampler(&device);
        let msaa = create_msaa_target(&device, &config, quad.sample_count);

        let projection = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("canto projection ubo"),
            size: MATRIX_SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let world_stride = align_to(
            MATRIX_SIZE,
            device.limits().min_uniform_buffer_offset_alignment as u64,
        );
        let world_capacity = 64;
        let worlds = create_world_buffer(&device, world_stride * world_capacity);
        let globals = create_globals(&device, &quad, &projection, &worlds, &sampler);

        let white = {
            let texture = create_texture_object(&device, 1, 1);
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &[255; 4],
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4),
                    rows_per_image: Some(1),
                },
                wgpu::Extent3d { width: 1, height: 1, depth_or_array_layers: 1 },
            );
            create_texture_bind_group(&device, &quad, &texture)
        };

        Ok(DeviceState {
            device,
            queue,
            lost,
            config,
            quad,
            sampler,
            msaa,
            projection,
            worlds,
            world_capacity,
            world_stride,
            globals,
            geometry: None,
            white,
            textures: HashMap::new(),
            viewport: ViewportRect::new(0, 0, params.back_buffer_width, params.back_buffer_height),
            world: Mat4::IDENTITY,
            bound: None,
            frame: None,
            clear: None,
            recording: Recording::default(),
            pending_result: None,
        })
    }
}

impl DeviceState {
    /// Applies new presentation parameters to the surface and rebuilds the
    /// targets that depend on them. Drops every texture.
    fn reconfigure(
        &mut self,
        surface: &wgpu::Surface<'_>,
        caps: &wgpu::SurfaceCapabilities,
        init: &GpuInit,
        params: &PresentParams,
    ) {
        self.frame = None;
        self.clear = None;
        self.recording.clear();
        self.pending_result = None;
        self.bound = None;
        for (_, tex) in self.textures.drain() {
            tex.texture.destroy();
        }

        self.config.width = params.back_buffer_width.max(1);
        self.config.height = params.back_buffer_height.max(1);
        self.config.present_mode =
            choose_present_mode(caps, params.interval, init.vsync_present_mode);
        surface.configure(&self.device, &self.config);

        if params.sample_count() != self.quad.sample_count {
            self.quad = QuadPipeline::new(&self.device, self.config.format, params.sample_count());
            self.globals = create_globals(
                &self.device,
                &self.quad,
                &self.projection,
                &self.worlds,
                &self.sampler,
            );
        }
        self.msaa = create_msaa_target(&self.device, &self.config, self.quad.sample_count);
    }

    fn ensure_world_capacity(&mut self, count: usize) {
        if count as u64 <= self.world_capacity {
            return;
        }
        let capacity = (count as u64).next_power_of_two();
        self.worlds = create_world_buffer(&self.device, self.world_stride * capacity);
        self.world_capacity = capacity;
        self.globals =
            create_globals(&self.device, &self.quad, &self.projection, &self.worlds, &self.sampler);
    }

    fn ensure_vertex_capacity(&mut self, count: usize) {
        let Some(geometry) = self.geometry.as_mut() else { return };
        if count <= geometry.capacity {
            return;
        }
        let capacity = count.next_power_of_two();
        geometry.vertices = create_vertex_buffer(&self.device, capacity);
        geometry.capacity = capacity;
    }

    /// Encodes everything recorded so far into one pass over the acquired
    /// frame and submits it.
    fn encode(&mut self) {
        let Some(frame) = self.frame.as_ref() else {
            self.recording.clear();
            return;
        };
        if self.recording.draws.is_empty() && self.clear.is_none() {
            self.recording.clear();
            return;
        }
        let target = frame.texture.texture.size();

        self.ensure_vertex_capacity(self.recording.vertices.len());
        self.ensure_world_capacity(self.recording.worlds.len());

        if let Some(geometry) = self.geometry.as_ref()
            && !self.recording.vertices.is_empty()
        {
            self.queue.write_buffer(
                &geometry.vertices,
                0,
                bytemuck::cast_slice(&self.recording.vertices),
            );
        }

        if !self.recording.worlds.is_empty() {
            let stride = self.world_stride as usize;
            let mut bytes = vec![0u8; stride * self.recording.worlds.len()];
            for (i, world) in self.recording.worlds.iter().enumerate() {
                let uniform = MatrixUniform::from(*world);
                bytes[i * stride..i * stride + MATRIX_SIZE as usize]
                    .copy_from_slice(bytemuck::bytes_of(&uniform));
            }
            self.queue.write_buffer(&self.worlds, 0, &bytes);
        }

        let load = match self.clear.take() {
            Some(color) => wgpu::LoadOp::Clear(color),
            None => wgpu::LoadOp::Load,
        };

        let Some(frame) = self.frame.as_ref() else { return };
        let (view, resolve_target) = match self.msaa.as_ref() {
            Some(msaa) => (msaa, Some(&frame.view)),
            None => (&frame.view, None),
        };

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("canto frame encoder"),
        });

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("canto quad pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target,
                    ops: wgpu::Operations { load, store: wgpu::StoreOp::Store },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if let Some(geometry) = self.geometry.as_ref()
                && !self.recording.draws.is_empty()
            {
                let vp = clamp_viewport(self.viewport, target.width, target.height);
                rpass.set_viewport(
                    vp.x as f32,
                    vp.y as f32,
                    vp.width as f32,
                    vp.height as f32,
                    0.0,
                    1.0,
                );
                rpass.set_pipeline(&self.quad.pipeline);
                rpass.set_vertex_buffer(0, geometry.vertices.slice(..));
                rpass.set_index_buffer(geometry.indices.slice(..), wgpu::IndexFormat::Uint16);

                for draw in &self.recording.draws {
                    let bind_group = match draw.texture {
                        Some(id) => match self.textures.get(&id) {
                            Some(tex) => &tex.bind_group,
                            None => continue,
                        },
                        None => &self.white,
                    };
                    let offset = (draw.world as u64 * self.world_stride) as u32;
                    rpass.set_bind_group(0, &self.globals, &[offset]);
                    rpass.set_bind_group(1, bind_group, &[]);
                    rpass.draw_indexed(0..geometry.index_count, draw.base_vertex as i32, 0..1);
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        self.recording.clear();
    }

    fn read_frame(&mut self) -> Result<FramePixels, DeviceError> {
        let frame = self
            .frame
            .as_ref()
            .ok_or_else(|| DeviceError::call("read back", "no frame in progress"))?;
        if !self.config.usage.contains(wgpu::TextureUsages::COPY_SRC) {
            return Err(DeviceError::call("read back", "surface does not support copies"));
        }

        let (width, height) = (self.config.width, self.config.height);
        let pitch = align_to(4 * width as u64, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as u64);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("canto readback"),
            size: pitch * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("canto readback encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &frame.texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(pitch as u32),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        let deadline = Instant::now() + READBACK_TIMEOUT;
        let mapped = loop {
            self.device
                .poll(wgpu::PollType::Poll)
                .map_err(|e| DeviceError::call("read back", e.to_string()))?;
            if let Ok(result) = rx.try_recv() {
                break result;
            }
            if Instant::now() >= deadline {
                return Err(DeviceError::call("read back", "timed out waiting for mapping"));
            }
            std::thread::yield_now();
        };
        mapped.map_err(|e| DeviceError::call("read back", e.to_string()))?;

        let row = 4 * width as usize;
        let mut pixels = Vec::with_capacity(row * height as usize);
        {
            let data = slice.get_mapped_range();
            for y in 0..height as usize {
                let start = y * pitch as usize;
                pixels.extend_from_slice(&data[start..start + row]);
            }
        }
        buffer.unmap();

        if is_rgba_order(self.config.format) {
            for px in pixels.chunks_exact_mut(4) {
                px.swap(0, 2);
            }
        }

        Ok(FramePixels { width, height, pixels })
    }
}

impl GpuBackend for WgpuBackend<'_> {
    fn probe(&mut self) -> Result<DeviceCaps, DeviceError> {
        let options = wgpu::RequestAdapterOptions {
            power_preference: self.init.power_preference,
            compatible_surface: Some(&self.surface),
            force_fallback_adapter: false,
        };
        let adapter = pollster::block_on(self.instance.request_adapter(&options))
            .map_err(|_| DeviceError::NoAdapter)?;

        let info = adapter.get_info();
        log::info!("adapter: {} ({:?}, {:?})", info.name, info.device_type, info.backend);

        let surface_caps = self.surface.get_capabilities(&adapter);
        self.format = choose_surface_format(&surface_caps, self.init.prefer_srgb)
            .ok_or_else(|| DeviceError::CreationFailed("no supported surface formats".into()))?;

        let downlevel = adapter.get_downlevel_capabilities();
        let caps = DeviceCaps {
            non_pow2_textures: downlevel
                .flags
                .contains(wgpu::DownlevelFlags::NON_POWER_OF_TWO_MIPMAPPED_TEXTURES),
            hw_transform_lighting: info.device_type != wgpu::DeviceType::Cpu,
            max_texture_size: adapter.limits().max_texture_dimension_2d,
        };

        self.surface_caps = Some(surface_caps);
        self.adapter = Some(adapter);
        Ok(caps)
    }

    fn supports_multisample(&self, samples: u32, _windowed: bool) -> bool {
        let Some(adapter) = self.adapter.as_ref() else { return false };
        adapter
            .get_texture_format_features(self.format)
            .flags
            .sample_count_supported(samples)
    }

    fn create_device(
        &mut self,
        params: &PresentParams,
        processing: VertexProcessing,
    ) -> Result<(), DeviceError> {
        log::debug!("creating wgpu device ({processing:?} vertex processing)");
        let state = self.open_device(params)?;
        self.gpu = Some(state);
        Ok(())
    }

    fn reset(&mut self, params: &PresentParams) -> Result<(), DeviceError> {
        let lost = match self.gpu.as_ref() {
            Some(state) => state.lost.load(Ordering::Acquire),
            None => return Err(DeviceError::NotInitialized),
        };

        if lost {
            log::info!("recreating lost wgpu device");
            self.gpu = None;
            self.gpu = Some(self.open_device(params)?);
            return Ok(());
        }

        let caps = self.surface_caps.as_ref().ok_or(DeviceError::NoAdapter)?;
        let Some(state) = self.gpu.as_mut() else { return Err(DeviceError::NotInitialized) };
        state.reconfigure(&self.surface, caps, &self.init, params);
        Ok(())
    }

    fn release_device(&mut self) {
        if let Some(mut state) = self.gpu.take() {
            state.frame = None;
            for (_, tex) in state.textures.drain() {
                tex.texture.destroy();
            }
        }
    }

    fn create_geometry(
        &mut self,
        vertex_capacity: usize,
        indices: &[u16],
    ) -> Result<(), DeviceError> {
        let state = self.state()?;
        let capacity = vertex_capacity.max(4);
        let index_buffer = state.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("canto quad ibo"),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        state.geometry = Some(Geometry {
            vertices: create_vertex_buffer(&state.device, capacity),
            capacity,
            indices: index_buffer,
            index_count: indices.len() as u32,
        });
        Ok(())
    }

    fn release_geometry(&mut self) {
        if let Some(state) = self.gpu.as_mut() {
            state.geometry = None;
        }
    }

    fn set_render_state(&mut self, state: RenderState) -> Result<(), DeviceError> {
        // Fixed in the pipeline and sampler.
        self.state()?;
        log::trace!("render state {state:?}");
        Ok(())
    }

    fn set_viewport(&mut self, viewport: ViewportRect) -> Result<(), DeviceError> {
        if !viewport.is_valid() {
            return Err(DeviceError::call("set viewport", format!("{viewport:?}")));
        }
        self.state()?.viewport = viewport;
        Ok(())
    }

    fn set_transform(&mut self, kind: TransformKind, matrix: Mat4) -> Result<(), DeviceError> {
        let state = self.state()?;
        match kind {
            TransformKind::Projection => {
                let uniform = MatrixUniform::from(matrix);
                state.queue.write_buffer(&state.projection, 0, bytemuck::bytes_of(&uniform));
            }
            TransformKind::World => state.world = matrix,
        }
        Ok(())
    }

    fn create_texture(&mut self, width: u32, height: u32) -> Result<GpuTextureId, DeviceError> {
        let id = GpuTextureId(self.next_texture_id);
        let state = self.state()?;

        let max = state.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(DeviceError::call("create texture", format!("{width}x{height}")));
        }

        let texture = create_texture_object(&state.device, width, height);
        let bind_group = create_texture_bind_group(&state.device, &state.quad, &texture);
        state.textures.insert(
            id,
            GpuTexture { texture, bind_group, width, height, staging: Vec::new() },
        );
        self.next_texture_id += 1;
        Ok(id)
    }

    fn lock_texture(&mut self, id: GpuTextureId) -> Result<LockedRect<'_>, DeviceError> {
        let state = self.state()?;
        let tex = state.textures.get_mut(&id).ok_or(DeviceError::UnknownTexture(id.0))?;
        let pitch = tex.pitch();
        tex.staging = vec![0; pitch * tex.height as usize];
        Ok(LockedRect { data: &mut tex.staging, pitch })
    }

    fn unlock_texture(&mut self, id: GpuTextureId) -> Result<(), DeviceError> {
        let state = self.state()?;
        let tex = state.textures.get_mut(&id).ok_or(DeviceError::UnknownTexture(id.0))?;
        if tex.staging.is_empty() {
            return Err(DeviceError::call("unlock texture", "texture is not locked"));
        }

        state.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &tex.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &tex.staging,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(tex.pitch() as u32),
                rows_per_image: Some(tex.height),
            },
            wgpu::Extent3d { width: tex.width, height: tex.height, depth_or_array_layers: 1 },
        );
        tex.staging = Vec::new();
        Ok(())
    }

    fn destroy_texture(&mut self, id: GpuTextureId) -> Result<(), DeviceError> {
        let state = self.state()?;
        let tex = state.textures.remove(&id).ok_or(DeviceError::UnknownTexture(id.0))?;
        tex.texture.destroy();
        if state.bound == Some(id) {
            state.bound = None;
        }
        Ok(())
    }

    fn set_texture(&mut self, id: Option<GpuTextureId>) -> Result<(), DeviceError> {
        let state = self.state()?;
        if let Some(id) = id
            && !state.textures.contains_key(&id)
        {
            return Err(DeviceError::UnknownTexture(id.0));
        }
        state.bound = id;
        Ok(())
    }

    fn write_vertices(&mut self, vertices: &[Vertex]) -> Result<(), DeviceError> {
        let state = self.state()?;
        if state.geometry.is_none() {
            return Err(DeviceError::call("write vertices", "no geometry"));
        }
        state.recording.vertex_base = state.recording.vertices.len() as u32;
        state.recording.vertices.extend_from_slice(vertices);
        Ok(())
    }

    fn draw_quad(&mut self, base_vertex: u32) -> Result<(), DeviceError> {
        let state = self.state()?;
        if state.frame.is_none() {
            return Err(DeviceError::call("draw", "no scene in progress"));
        }

        let rec = &mut state.recording;
        let base_vertex = rec.vertex_base + base_vertex;
        if base_vertex as usize + 4 > rec.vertices.len() {
            return Err(DeviceError::call("draw", format!("vertex {base_vertex} out of range")));
        }
        if rec.worlds.last() != Some(&state.world) {
            rec.worlds.push(state.world);
        }
        rec.draws.push(RecordedDraw {
            texture: state.bound,
            base_vertex,
            world: rec.worlds.len() - 1,
        });
        Ok(())
    }

    fn clear(&mut self, color: ColorRgba) -> Result<(), DeviceError> {
        self.state()?.clear = Some(wgpu::Color {
            r: color.r as f64,
            g: color.g as f64,
            b: color.b as f64,
            a: color.a as f64,
        });
        Ok(())
    }

    fn begin_scene(&mut self) -> Result<(), DeviceError> {
        let state = self.gpu.as_mut().ok_or(DeviceError::NotInitialized)?;
        if state.frame.is_some() {
            return Ok(());
        }

        match self.surface.get_current_texture() {
            Ok(texture) => {
                let view = texture.texture.create_view(&wgpu::TextureViewDescriptor::default());
                state.frame = Some(Frame { texture, view });
                Ok(())
            }
            Err(err) => {
                let (result, error) = map_surface_error(err);
                state.pending_result = Some(result);
                Err(error)
            }
        }
    }

    fn end_scene(&mut self) -> Result<(), DeviceError> {
        let state = self.state()?;
        if state.frame.is_none() {
            return Err(DeviceError::call("end scene", "no scene in progress"));
        }
        state.encode();
        Ok(())
    }

    fn present(&mut self) -> PresentResult {
        let window = self.window;
        let Some(state) = self.gpu.as_mut() else { return PresentResult::Failed };

        if state.lost.load(Ordering::Acquire) {
            state.frame = None;
            return PresentResult::NeedsReset;
        }
        if let Some(result) = state.pending_result.take() {
            return result;
        }

        state.encode();
        match state.frame.take() {
            Some(frame) => {
                window.pre_present_notify();
                frame.texture.present();
                PresentResult::Ok
            }
            None => PresentResult::Failed,
        }
    }

    fn read_back_buffer(&mut self) -> Result<FramePixels, DeviceError> {
        let state = self.state()?;
        state.encode();
        state.read_frame()
    }
}

// ── helpers ───────────────────────────────────────────────────────────────

fn create_texture_object(device: &wgpu::Device, width: u32, height: u32) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("canto texture"),
        size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TEXTURE_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    })
}

fn create_texture_bind_group(
    device: &wgpu::Device,
    quad: &QuadPipeline,
    texture: &wgpu::Texture,
) -> wgpu::BindGroup {
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("canto texture bind group"),
        layout: &quad.texture_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::TextureView(&view),
        }],
    })
}

fn create_vertex_buffer(device: &wgpu::Device, vertices: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("canto quad vbo"),
        size: (vertices * std::mem::size_of::<Vertex>()) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_world_buffer(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("canto world ubo"),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_globals(
    device: &wgpu::Device,
    quad: &QuadPipeline,
    projection: &wgpu::Buffer,
    worlds: &wgpu::Buffer,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("canto globals bind group"),
        layout: &quad.globals_layout,
        entries: &[
            wgpu::BindGroupEntry { binding: 0, resource: projection.as_entire_binding() },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: worlds,
                    offset: 0,
                    size: wgpu::BufferSize::new(MATRIX_SIZE),
                }),
            },
            wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::Sampler(sampler) },
        ],
    })
}

fn create_msaa_target(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    sample_count: u32,
) -> Option<wgpu::TextureView> {
    if sample_count <= 1 {
        return None;
    }
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("canto msaa target"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count,
        dimension: wgpu::TextureDimension::D2,
        format: config.format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    Some(texture.create_view(&wgpu::TextureViewDescriptor::default()))
}

/// Keeps the viewport inside the render target.
fn clamp_viewport(vp: ViewportRect, width: u32, height: u32) -> ViewportRect {
    let x = vp.x.min(width.saturating_sub(1));
    let y = vp.y.min(height.saturating_sub(1));
    ViewportRect::new(x, y, vp.width.min(width - x).max(1), vp.height.min(height - y).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_is_clamped_to_target() {
        let vp = clamp_viewport(ViewportRect::new(100, 60, 1920, 1080), 1280, 720);
        assert_eq!(vp, ViewportRect::new(100, 60, 1180, 660));
        let inside = ViewportRect::new(0, 60, 1920, 1080);
        assert_eq!(clamp_viewport(inside, 1920, 1200), inside);
    }
}
