use glam::{vec3, Mat4};

use super::host::WindowHost;
use super::{
    DeviceCaps, GpuBackend, PresentInterval, PresentParams, PresentResult, RenderState,
    TransformKind,
};
use crate::config::{AntiAliasing, RendererConfig};
use crate::coords::ViewportRect;
use crate::error::{DeviceError, RenderError, RenderResult};
use crate::render::QUAD_INDICES;

/// Where the device is in its life.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeviceStatus {
    Uninitialized,
    /// Device created; geometry and states not applied yet.
    Initialized,
    Running,
    /// Present reported that the device needs a reset.
    DeviceLost,
    Disposed,
}

/// Owns the backend and everything about the device that is not a texture:
/// presentation parameters, viewport, transforms and fullscreen state.
pub struct DeviceManager<B> {
    backend: B,
    status: DeviceStatus,
    caps: DeviceCaps,
    params: PresentParams,

    render_size: (u32, u32),
    z_range: (f32, f32),
    requested_aa: AntiAliasing,
    vertex_capacity: usize,

    viewport: ViewportRect,
    fullscreen: bool,
    /// Client size to restore when leaving fullscreen.
    windowed_size: Option<(u32, u32)>,
}

impl<B: GpuBackend> DeviceManager<B> {
    pub fn new(backend: B, config: &RendererConfig) -> Self {
        let render_size = (config.render_width.max(1), config.render_height.max(1));
        Self {
            backend,
            status: DeviceStatus::Uninitialized,
            caps: DeviceCaps::default(),
            params: PresentParams {
                back_buffer_width: render_size.0,
                back_buffer_height: render_size.1,
                windowed: !config.fullscreen,
                multisample: AntiAliasing::None,
                interval: PresentInterval::from_vsync(config.vsync),
            },
            render_size,
            z_range: (config.z_near, config.z_far),
            requested_aa: config.anti_aliasing,
            vertex_capacity: 4 * config.batch_quads.max(1),
            viewport: ViewportRect::new(0, 0, render_size.0, render_size.1),
            fullscreen: false,
            windowed_size: None,
        }
    }

    // ── accessors ───────────────────────────────────────────────────────────

    pub fn status(&self) -> DeviceStatus {
        self.status
    }

    pub fn is_usable(&self) -> bool {
        matches!(self.status, DeviceStatus::Initialized | DeviceStatus::Running)
    }

    pub fn caps(&self) -> DeviceCaps {
        self.caps
    }

    pub fn params(&self) -> &PresentParams {
        &self.params
    }

    pub fn viewport(&self) -> ViewportRect {
        self.viewport
    }

    pub fn render_size(&self) -> (u32, u32) {
        self.render_size
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub(crate) fn mark_running(&mut self) {
        self.status = DeviceStatus::Running;
    }

    // ── transforms ──────────────────────────────────────────────────────────

    /// Orthographic projection centred on the render area.
    pub fn projection(&self) -> Mat4 {
        let (w, h) = (self.render_size.0 as f32, self.render_size.1 as f32);
        Mat4::orthographic_lh(-w / 2.0, w / 2.0, -h / 2.0, h / 2.0, self.z_range.0, self.z_range.1)
    }

    /// Moves render-area coordinates (+Y down, negated by the quad builder)
    /// into the projection's centred space.
    pub fn view_origin(&self) -> Mat4 {
        let (w, h) = (self.render_size.0 as f32, self.render_size.1 as f32);
        Mat4::from_translation(vec3(-w / 2.0, h / 2.0, 0.0))
    }

    // ── lifecycle ───────────────────────────────────────────────────────────

    /// Probes the adapter and creates the device for a client area of
    /// `client` pixels. Failure is fatal.
    pub fn create(&mut self, client: (u32, u32)) -> RenderResult<()> {
        if self.status != DeviceStatus::Uninitialized {
            return Err(RenderError::InvalidState(self.status));
        }

        self.caps = self.backend.probe().map_err(|e| {
            log::error!("adapter probe failed: {e}");
            RenderError::Device(DeviceError::NoAdapter)
        })?;
        log::debug!("device caps: {:?}", self.caps);

        let (w, h) = (client.0.max(1), client.1.max(1));
        self.params.back_buffer_width = w;
        self.params.back_buffer_height = h;
        self.params.multisample = self.negotiate_multisample();

        let processing = self.caps.vertex_processing();
        if processing == super::VertexProcessing::Software {
            log::warn!("hardware vertex processing unavailable, using software");
        }

        if let Err(e) = self.backend.create_device(&self.params, processing) {
            log::error!("device creation failed: {e}");
            return Err(match e {
                DeviceError::NoAdapter | DeviceError::CreationFailed(_) => RenderError::Device(e),
                other => RenderError::Device(DeviceError::CreationFailed(other.to_string())),
            });
        }

        self.viewport = ViewportRect::letterbox(w, h, self.aspect());
        self.status = DeviceStatus::Initialized;
        log::debug!("device created: {:?}", self.params);
        Ok(())
    }

    fn negotiate_multisample(&self) -> AntiAliasing {
        let requested = match self.requested_aa {
            AntiAliasing::X32 => AntiAliasing::X16,
            aa => aa,
        };
        if requested == AntiAliasing::None {
            return requested;
        }

        if self.backend.supports_multisample(requested.samples(), self.params.windowed) {
            requested
        } else {
            log::warn!("antialiasing {requested:?} not supported, disabling");
            AntiAliasing::None
        }
    }

    fn aspect(&self) -> f32 {
        self.render_size.0 as f32 / self.render_size.1 as f32
    }

    /// Creates geometry and applies render states, viewport and transforms.
    /// Individual failures are logged; the device stays usable.
    pub fn setup(&mut self) {
        if let Err(e) = self.backend.create_geometry(self.vertex_capacity, &QUAD_INDICES) {
            log::error!("geometry creation failed: {e}");
        }

        let multisample = self.params.multisample != AntiAliasing::None;
        let states = [
            RenderState::CullNone,
            RenderState::AlphaBlend,
            RenderState::Lighting(false),
            RenderState::MultisampleAntialias(multisample),
            RenderState::LinearFiltering,
            RenderState::ClampAddressing,
            RenderState::ModulateAlpha,
        ];
        for state in states {
            if let Err(e) = self.backend.set_render_state(state) {
                log::error!("render state {state:?}: {e}");
            }
        }

        if let Err(e) = self.backend.set_viewport(self.viewport) {
            log::error!("set viewport: {e}");
        }
        let projection = self.projection();
        let origin = self.view_origin();
        self.set_transform(TransformKind::Projection, projection);
        self.set_transform(TransformKind::World, origin);
    }

    pub fn set_transform(&mut self, kind: TransformKind, matrix: Mat4) {
        if let Err(e) = self.backend.set_transform(kind, matrix) {
            log::error!("set {kind:?} transform: {e}");
        }
    }

    /// Presents and moves to `DeviceLost` when a reset is needed.
    pub fn present(&mut self) -> PresentResult {
        let result = self.backend.present();
        match result {
            PresentResult::Ok => {}
            PresentResult::NeedsReset => {
                log::warn!("device lost, reset required");
                self.status = DeviceStatus::DeviceLost;
            }
            PresentResult::Failed => log::error!("present failed"),
            PresentResult::Fatal => log::error!("present failed, device unusable"),
        }
        result
    }

    /// Releases geometry and resets the device with the current parameters.
    /// Textures are invalidated; the caller recreates them and calls
    /// [`setup`](Self::setup).
    pub fn reset(&mut self) -> RenderResult<()> {
        if matches!(self.status, DeviceStatus::Uninitialized | DeviceStatus::Disposed) {
            return Err(RenderError::InvalidState(self.status));
        }

        self.backend.release_geometry();
        if let Err(e) = self.backend.reset(&self.params) {
            log::error!("device reset failed: {e}");
            self.status = DeviceStatus::DeviceLost;
            return Err(e.into());
        }

        self.status = DeviceStatus::Initialized;
        let (w, h) = (self.params.back_buffer_width, self.params.back_buffer_height);
        log::debug!("device reset to {w}x{h}");
        Ok(())
    }

    /// Records a new client size and letterboxes the viewport. Returns
    /// `true` when the device must be reset for the new size. A zero-sized
    /// (minimized) client keeps the previous size.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            log::debug!("ignoring resize to {width}x{height}");
            return false;
        }

        self.params.back_buffer_width = width;
        self.params.back_buffer_height = height;
        self.viewport = ViewportRect::letterbox(width, height, self.aspect());
        log::debug!("resize to {width}x{height}, viewport {:?}", self.viewport);

        matches!(
            self.status,
            DeviceStatus::Initialized | DeviceStatus::Running | DeviceStatus::DeviceLost
        )
    }

    /// Borderless fullscreen. Returns `true` when the device must be reset.
    pub fn set_fullscreen<H: WindowHost + ?Sized>(
        &mut self,
        host: &mut H,
        fullscreen: bool,
    ) -> bool {
        if fullscreen == self.fullscreen {
            return false;
        }

        if fullscreen {
            let Some(display) = host.display_bounds() else {
                log::warn!("no display bounds, staying windowed");
                return false;
            };
            self.windowed_size = Some(host.client_size());
            host.set_decorated(false);
            host.set_position(display.x, display.y);
            host.set_client_size(display.width, display.height);
            self.fullscreen = true;
            self.params.windowed = false;
            self.resize(display.width, display.height)
        } else {
            let (w, h) = self.windowed_size.take().unwrap_or(self.render_size);
            host.set_decorated(true);
            host.set_client_size(w, h);
            host.center();
            self.fullscreen = false;
            self.params.windowed = true;
            self.resize(w, h)
        }
    }

    /// Releases geometry and the device. Irreversible.
    pub fn dispose(&mut self) {
        if self.status == DeviceStatus::Disposed {
            return;
        }
        if self.status != DeviceStatus::Uninitialized {
            self.backend.release_geometry();
            self.backend.release_device();
        }
        self.status = DeviceStatus::Disposed;
        log::debug!("device disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::headless::{Call, HeadlessBackend, HeadlessWindow};
    use crate::device::VertexProcessing;

    fn manager(config: RendererConfig) -> DeviceManager<HeadlessBackend> {
        DeviceManager::new(HeadlessBackend::default(), &config)
    }

    #[test]
    fn unsupported_antialiasing_falls_back_to_none() {
        let config = RendererConfig { anti_aliasing: AntiAliasing::X8, ..Default::default() };
        let mut dm = manager(config);
        dm.backend_mut().max_samples = 4;
        dm.create((1280, 720)).unwrap();
        assert_eq!(dm.backend().params().unwrap().multisample, AntiAliasing::None);
    }

    #[test]
    fn supported_antialiasing_is_kept() {
        let config = RendererConfig { anti_aliasing: AntiAliasing::X4, ..Default::default() };
        let mut dm = manager(config);
        dm.create((1280, 720)).unwrap();
        assert_eq!(dm.params().multisample, AntiAliasing::X4);
    }

    #[test]
    fn vsync_maps_to_interval() {
        let mut dm = manager(RendererConfig { vsync: false, ..Default::default() });
        dm.create((640, 360)).unwrap();
        assert_eq!(dm.params().interval, PresentInterval::Immediate);
    }

    #[test]
    fn software_processing_without_hw_transform() {
        let mut dm = manager(RendererConfig::default());
        dm.backend_mut().caps.hw_transform_lighting = false;
        dm.create((640, 360)).unwrap();
        assert_eq!(dm.backend().vertex_processing(), Some(VertexProcessing::Software));
    }

    #[test]
    fn creation_failure_is_fatal_and_keeps_status() {
        let mut dm = manager(RendererConfig::default());
        dm.backend_mut().fail_device_creation = true;
        let err = dm.create((640, 360)).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(dm.status(), DeviceStatus::Uninitialized);
    }

    #[test]
    fn render_state_failures_are_not_fatal() {
        let mut dm = manager(RendererConfig::default());
        dm.create((640, 360)).unwrap();
        dm.backend_mut().fail_render_states = true;
        dm.setup();
        let states = dm.backend().count(|c| matches!(c, Call::SetRenderState(_)));
        assert_eq!(states, 7);
        let world = |c: &Call| matches!(c, Call::SetTransform(TransformKind::World, _));
        assert!(dm.backend().calls().iter().any(world));
    }

    #[test]
    fn needs_reset_moves_to_device_lost() {
        let mut dm = manager(RendererConfig::default());
        dm.create((640, 360)).unwrap();
        dm.mark_running();
        dm.backend_mut().script_present(PresentResult::NeedsReset);
        assert_eq!(dm.present(), PresentResult::NeedsReset);
        assert_eq!(dm.status(), DeviceStatus::DeviceLost);
        dm.reset().unwrap();
        assert_eq!(dm.status(), DeviceStatus::Initialized);
    }

    #[test]
    fn resize_letterboxes_and_skips_minimized() {
        let mut dm = manager(RendererConfig::default());
        dm.create((1280, 720)).unwrap();
        assert!(dm.resize(1920, 1200));
        assert_eq!(dm.viewport(), ViewportRect::new(0, 60, 1920, 1080));
        assert!(!dm.resize(0, 0));
        assert_eq!(dm.params().back_buffer_width, 1920);
    }

    #[test]
    fn fullscreen_round_trip_restores_window() {
        let mut dm = manager(RendererConfig::default());
        dm.create((1280, 720)).unwrap();
        let mut window = HeadlessWindow::new(1280, 720);

        assert!(dm.set_fullscreen(&mut window, true));
        assert!(!window.decorated);
        assert_eq!(window.size, (1920, 1080));
        assert_eq!(dm.params().back_buffer_width, 1920);
        assert!(!dm.params().windowed);

        assert!(dm.set_fullscreen(&mut window, false));
        assert!(window.decorated && window.centered);
        assert_eq!(window.size, (1280, 720));
        assert!(dm.params().windowed);
    }

    #[test]
    fn projection_maps_render_corners_to_clip_edges() {
        let dm = manager(RendererConfig::default());
        let m = dm.projection() * dm.view_origin();
        let top_left = m.project_point3(vec3(0.0, 0.0, 0.0));
        let bottom_right = m.project_point3(vec3(1280.0, -720.0, 0.0));
        assert!((top_left.x + 1.0).abs() < 1e-5 && (top_left.y - 1.0).abs() < 1e-5);
        assert!((bottom_right.x - 1.0).abs() < 1e-5 && (bottom_right.y + 1.0).abs() < 1e-5);
    }
}
