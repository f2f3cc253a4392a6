use std::path::{Path, PathBuf};

use super::geometry::{
    pack_argb, reflection_quad, rotation_transform, section_quad, textured_quad, UvExtent,
};
use super::{QuadBatch, Vertex};
use crate::config::RendererConfig;
use crate::coords::{ColorRgba, DrawRect, Rect, ViewportRect};
use crate::device::{
    upload_texture, DeviceManager, DeviceStatus, FramePixels, GpuBackend, GpuTextureId,
    PresentResult, WindowHost,
};
use crate::error::{RenderError, RenderResult};
use crate::screenshot;
use crate::text::{FontId, FontSystem, TextCache, TextEntry};
use crate::texture::{TextureHandle, TextureRecord, TextureSample, TextureStore};

/// What happened to a frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// The device was lost and has been reset and rebuilt.
    Recovered,
    /// Nothing was shown: the device is not running, present failed
    /// transiently or a reset has to be retried.
    Skipped,
    /// The device is unusable, or a draw call hit a fatal error
    /// ([`Renderer::fatal_error`]).
    Fatal,
}

/// Full set of options for a textured draw.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DrawParams {
    pub rect: DrawRect,
    pub color: ColorRgba,
    /// Clip rectangle; the whole render area when `None`.
    pub bounds: Option<Rect>,
    pub mirrored: bool,
}

impl DrawParams {
    pub fn new(rect: impl Into<DrawRect>) -> Self {
        Self { rect: rect.into(), color: ColorRgba::white(), bounds: None, mirrored: false }
    }

    pub fn color(mut self, color: ColorRgba) -> Self {
        self.color = color;
        self
    }

    pub fn bounds(mut self, bounds: Rect) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn mirrored(mut self, mirrored: bool) -> Self {
        self.mirrored = mirrored;
        self
    }
}

/// Immediate-mode 2D renderer over a [`GpuBackend`].
///
/// Owns the device manager, the texture store and the quad batch. Drawing
/// happens inside [`frame`](Self::frame); textures can be created at any
/// time the device is usable, or queued from other threads through a
/// [`TextureStore`] clone.
pub struct Renderer<B: GpuBackend> {
    config: RendererConfig,
    device: DeviceManager<B>,
    textures: TextureStore,
    batch: QuadBatch,
    /// 1x1 white texture for solid color draws.
    blank: Option<GpuTextureId>,
    text: TextCache,

    global_alpha: f32,
    z_offset: f32,
    frame_index: u64,
    pending_fullscreen: Option<bool>,
    /// Fatal error raised by a draw call; ends the frame loop.
    fatal: Option<RenderError>,
}

impl<B: GpuBackend> Renderer<B> {
    pub fn new(backend: B, config: RendererConfig) -> Self {
        Self {
            device: DeviceManager::new(backend, &config),
            textures: TextureStore::new(config.texture_capacity),
            batch: QuadBatch::new(config.batch_quads),
            blank: None,
            text: TextCache::new(config.text_cache_frames),
            global_alpha: 1.0,
            z_offset: 0.0,
            frame_index: 0,
            pending_fullscreen: None,
            fatal: None,
            config,
        }
    }

    // ── lifecycle ───────────────────────────────────────────────────────────

    /// Creates the device for a client area of `client` pixels and prepares
    /// it for drawing. A returned error is fatal.
    pub fn init(&mut self, client: (u32, u32)) -> RenderResult<()> {
        self.device.create(client)?;
        self.textures.set_non_pow2(self.device.caps().non_pow2_textures);
        self.prepare_device();
        log::info!(
            "renderer ready: {}x{} render area, {}x{} back buffer",
            self.config.render_width,
            self.config.render_height,
            self.device.params().back_buffer_width,
            self.device.params().back_buffer_height
        );
        Ok(())
    }

    /// Geometry, states, transforms and the blank texture.
    fn prepare_device(&mut self) {
        self.device.setup();

        let gpu = self.device.backend_mut();
        self.blank = match upload_texture(gpu, (1, 1), 1, 1, &[255; 4]) {
            Ok(id) => Some(id),
            Err(e) => {
                log::error!("blank texture creation failed: {e}");
                None
            }
        };
        self.device.mark_running();
    }

    /// Resets the device and rebuilds every device resource, including the
    /// GPU objects of all textures. Handles stay valid.
    pub fn reset(&mut self) -> RenderResult<()> {
        self.batch.clear();
        // The reset invalidates it with every other texture.
        self.blank = None;

        self.device.reset()?;
        self.prepare_device();
        self.textures.recreate_all(self.device.backend_mut());
        Ok(())
    }

    /// Releases every texture and the device. The renderer is unusable
    /// afterwards.
    pub fn unload(&mut self) {
        if self.device.status() == DeviceStatus::Disposed {
            return;
        }

        self.batch.clear();
        for handle in self.text.drain() {
            self.textures.release(handle);
        }

        let gpu = self.device.backend_mut();
        self.textures.unload(gpu);
        if let Some(blank) = self.blank.take() {
            let _ = gpu.destroy_texture(blank);
        }

        self.device.dispose();
        log::info!("renderer unloaded");
    }

    /// Runs one frame: clear, begin, realize one queued upload, `draw`,
    /// flush, end, `update`, present, then recovery and any requested
    /// fullscreen change.
    pub fn frame<H, D, U>(&mut self, host: &mut H, draw: D, update: U) -> FrameOutcome
    where
        H: WindowHost + ?Sized,
        D: FnOnce(&mut Self),
        U: FnOnce(&mut Self),
    {
        self.frame_with(host, &mut (), |r, _| draw(r), |r, _| update(r))
    }

    /// [`frame`](Self::frame) with caller state shared by both phases.
    pub fn frame_with<H, S, D, U>(
        &mut self,
        host: &mut H,
        state: &mut S,
        draw: D,
        update: U,
    ) -> FrameOutcome
    where
        H: WindowHost + ?Sized,
        S: ?Sized,
        D: FnOnce(&mut Self, &mut S),
        U: FnOnce(&mut Self, &mut S),
    {
        if self.fatal.is_some() {
            return FrameOutcome::Fatal;
        }
        match self.device.status() {
            DeviceStatus::Running => {}
            DeviceStatus::DeviceLost => {
                return if self.recover() { FrameOutcome::Recovered } else { FrameOutcome::Skipped };
            }
            _ => return FrameOutcome::Skipped,
        }

        let clear = self.config.clear_color;
        let gpu = self.device.backend_mut();
        if let Err(e) = gpu.clear(clear) {
            log::error!("clear failed: {e}");
        }

        let scene_open = match gpu.begin_scene() {
            Ok(()) => true,
            Err(e) => {
                log::error!("begin scene failed: {e}");
                false
            }
        };

        if scene_open {
            self.textures.drain_one(self.device.backend_mut());
            self.textures.collect_retired(self.device.backend_mut());

            draw(self, state);
            self.batch.flush(self.device.backend_mut());

            if let Err(e) = self.device.backend_mut().end_scene() {
                log::error!("end scene failed: {e}");
            }
        }

        update(self, state);

        for handle in self.text.evict(self.frame_index) {
            self.textures.release(handle);
        }
        self.frame_index += 1;

        let outcome = match self.device.present() {
            PresentResult::Ok if scene_open => FrameOutcome::Presented,
            PresentResult::Ok | PresentResult::Failed => FrameOutcome::Skipped,
            PresentResult::NeedsReset => {
                if self.recover() { FrameOutcome::Recovered } else { FrameOutcome::Skipped }
            }
            PresentResult::Fatal => return FrameOutcome::Fatal,
        };
        if let Some(e) = &self.fatal {
            log::error!("frame loop stopped: {e}");
            return FrameOutcome::Fatal;
        }

        if let Some(fullscreen) = self.pending_fullscreen.take() {
            self.apply_fullscreen(host, fullscreen);
        }
        outcome
    }

    fn recover(&mut self) -> bool {
        match self.reset() {
            Ok(()) => {
                log::info!("device recovered");
                true
            }
            Err(e) => {
                log::error!("device recovery failed: {e}");
                false
            }
        }
    }

    /// Letterboxes the viewport for a new client size and resets the device.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.device.resize(width, height)
            && let Err(e) = self.reset()
        {
            log::error!("reset after resize failed: {e}");
        }
    }

    /// Requests borderless fullscreen; applied after the current frame.
    pub fn set_fullscreen(&mut self, fullscreen: bool) {
        self.pending_fullscreen = Some(fullscreen);
    }

    pub fn toggle_fullscreen(&mut self) {
        let current = self.pending_fullscreen.unwrap_or(self.device.is_fullscreen());
        self.set_fullscreen(!current);
    }

    /// Switches fullscreen immediately. Must not be called inside a frame.
    pub fn apply_fullscreen<H: WindowHost + ?Sized>(&mut self, host: &mut H, fullscreen: bool) {
        if self.device.set_fullscreen(host, fullscreen)
            && let Err(e) = self.reset()
        {
            log::error!("reset after fullscreen change failed: {e}");
        }
    }

    // ── state ───────────────────────────────────────────────────────────────

    pub fn status(&self) -> DeviceStatus {
        self.device.status()
    }

    pub fn device(&self) -> &DeviceManager<B> {
        &self.device
    }

    pub fn backend(&self) -> &B {
        self.device.backend()
    }

    pub fn backend_mut(&mut self) -> &mut B {
        self.device.backend_mut()
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn screen_width(&self) -> u32 {
        self.device.render_size().0
    }

    pub fn screen_height(&self) -> u32 {
        self.device.render_size().1
    }

    pub fn viewport(&self) -> ViewportRect {
        self.device.viewport()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.device.is_fullscreen()
    }

    /// The fatal error that made [`frame`](Self::frame) report
    /// [`FrameOutcome::Fatal`], when a draw call raised one.
    pub fn fatal_error(&self) -> Option<&RenderError> {
        self.fatal.as_ref()
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Multiplies the alpha of every following draw.
    pub fn set_global_alpha(&mut self, alpha: f32) {
        self.global_alpha = alpha.clamp(0.0, 1.0);
    }

    pub fn global_alpha(&self) -> f32 {
        self.global_alpha
    }

    /// Added to the z of every following draw.
    pub fn set_z_offset(&mut self, z: f32) {
        self.z_offset = z;
    }

    pub fn z_offset(&self) -> f32 {
        self.z_offset
    }

    fn screen_rect(&self) -> Rect {
        let (w, h) = self.device.render_size();
        Rect::new(0.0, 0.0, w as f32, h as f32)
    }

    fn require_device(&self) -> RenderResult<()> {
        if self.device.is_usable() {
            Ok(())
        } else {
            Err(RenderError::InvalidState(self.device.status()))
        }
    }

    // ── textures ────────────────────────────────────────────────────────────

    /// Shared handle to the texture store, for queueing uploads from other
    /// threads.
    pub fn texture_store(&self) -> TextureStore {
        self.textures.clone()
    }

    /// Creates a texture from BGRA8 pixels and uploads it now.
    pub fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> RenderResult<TextureHandle> {
        self.require_device()?;
        self.textures.create_from_pixels(self.device.backend_mut(), width, height, pixels)
    }

    /// Loads an image file. Missing or unreadable files give
    /// [`TextureHandle::INVALID`].
    pub fn create_texture_from_file(
        &mut self,
        path: impl AsRef<Path>,
    ) -> RenderResult<TextureHandle> {
        self.require_device()?;
        let quality = self.config.texture_quality;
        self.textures.create_from_file(self.device.backend_mut(), path.as_ref(), quality)
    }

    /// Allocates a texture now and uploads its pixels during a later frame.
    pub fn queue_texture(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> RenderResult<TextureHandle> {
        if self.device.status() == DeviceStatus::Disposed {
            return Err(RenderError::InvalidState(DeviceStatus::Disposed));
        }
        self.textures.queue_upload(width, height, pixels)
    }

    /// Replaces a texture's pixels; dimensions stay as created.
    pub fn update_texture(&mut self, handle: TextureHandle, pixels: &[u8]) -> bool {
        self.device.is_usable() && self.textures.update(self.device.backend_mut(), handle, pixels)
    }

    /// Releases a texture. Stale or invalid handles are ignored.
    pub fn release_texture(&mut self, handle: TextureHandle) {
        if self.textures.release(handle) && self.device.is_usable() {
            self.textures.collect_retired(self.device.backend_mut());
        }
    }

    pub fn texture_exists(&self, handle: TextureHandle) -> bool {
        self.textures.exists(handle)
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<TextureRecord> {
        self.textures.record(handle)
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    // ── drawing ─────────────────────────────────────────────────────────────

    fn push_quad(&mut self, quad: [Vertex; 4], object: GpuTextureId, rotation: f32) {
        if !self.device.is_usable() {
            return;
        }
        let transform = rotation_transform(self.device.view_origin(), rotation, &quad);
        self.batch.push(self.device.backend_mut(), quad, object, transform);
    }

    fn sample(&self, handle: TextureHandle) -> Option<TextureSample> {
        self.textures.sample(handle)
    }

    /// Draws a texture at its default rectangle and tint.
    pub fn draw_texture(&mut self, handle: TextureHandle) {
        let Some(s) = self.sample(handle) else { return };
        self.draw_texture_with(handle, DrawParams::new(s.rect).color(s.color));
    }

    /// Draws a texture into `rect` with its default tint.
    pub fn draw_texture_in(&mut self, handle: TextureHandle, rect: impl Into<DrawRect>) {
        let Some(s) = self.sample(handle) else { return };
        self.draw_texture_with(handle, DrawParams::new(rect).color(s.color));
    }

    /// Draws a texture clipped to `params.bounds`. Unknown textures and
    /// textures still waiting for their upload are skipped.
    pub fn draw_texture_with(&mut self, handle: TextureHandle, params: DrawParams) {
        let Some(s) = self.sample(handle) else { return };
        let bounds = params.bounds.unwrap_or_else(|| self.screen_rect());
        let z = params.rect.z + self.z_offset;
        let color = pack_argb(params.color, self.global_alpha);
        let extent = UvExtent::new(s.width_ratio, s.height_ratio);

        if let Some(quad) = textured_quad(params.rect, bounds, extent, color, params.mirrored, z) {
            self.push_quad(quad, s.object, params.rect.rotation);
        }
    }

    /// Draws the horizontal part `[begin, end]` (fractions of the width) of
    /// a texture into the same part of `rect`.
    pub fn draw_texture_section(
        &mut self,
        handle: TextureHandle,
        rect: impl Into<DrawRect>,
        color: ColorRgba,
        begin: f32,
        end: f32,
    ) {
        let Some(s) = self.sample(handle) else { return };
        let rect = rect.into();
        if rect.rect.w == 0.0 || rect.rect.h == 0.0 {
            return;
        }
        let z = rect.z + self.z_offset;
        let color = pack_argb(color, self.global_alpha);
        let extent = UvExtent::new(s.width_ratio, s.height_ratio);
        let quad = section_quad(rect, extent, color, begin, end, z);
        self.push_quad(quad, s.object, rect.rotation);
    }

    /// Draws a mirrored, fading copy of a texture `space` pixels below
    /// `rect`.
    pub fn draw_texture_reflection(
        &mut self,
        handle: TextureHandle,
        rect: impl Into<DrawRect>,
        color: ColorRgba,
        bounds: Rect,
        space: f32,
        height: f32,
    ) {
        let Some(s) = self.sample(handle) else { return };
        let extent = UvExtent::new(s.width_ratio, s.height_ratio);
        self.reflect(s.object, extent, rect.into(), color, bounds, space, height);
    }

    #[allow(clippy::too_many_arguments)]
    fn reflect(
        &mut self,
        object: GpuTextureId,
        extent: UvExtent,
        rect: DrawRect,
        color: ColorRgba,
        bounds: Rect,
        space: f32,
        height: f32,
    ) {
        let z = rect.z + self.z_offset;
        let alpha = self.global_alpha;
        if let Some(quad) = reflection_quad(rect, bounds, extent, color, alpha, space, height, z) {
            self.push_quad(quad, object, rect.rotation);
        }
    }

    /// Fills `rect` with a solid color.
    pub fn draw_color(&mut self, color: ColorRgba, rect: impl Into<DrawRect>) {
        let Some(blank) = self.blank else { return };
        let rect = rect.into();
        let z = rect.z + self.z_offset;
        let packed = pack_argb(color, self.global_alpha);
        let screen = self.screen_rect();
        if let Some(quad) = textured_quad(rect, screen, UvExtent::FULL, packed, false, z) {
            self.push_quad(quad, blank, rect.rotation);
        }
    }

    /// Solid color counterpart of
    /// [`draw_texture_reflection`](Self::draw_texture_reflection).
    pub fn draw_color_reflection(
        &mut self,
        color: ColorRgba,
        rect: impl Into<DrawRect>,
        space: f32,
        height: f32,
    ) {
        let Some(blank) = self.blank else { return };
        let bounds = self.screen_rect();
        self.reflect(blank, UvExtent::FULL, rect.into(), color, bounds, space, height);
    }

    /// Draws a `width`-thick line from `(x1, y1)` to `(x2, y2)`.
    pub fn draw_line(&mut self, color: ColorRgba, width: f32, x1: f32, y1: f32, x2: f32, y2: f32) {
        let Some(blank) = self.blank else { return };
        let (dx, dy) = (x2 - x1, y2 - y1);
        let length = dx.hypot(dy);
        if length == 0.0 || width <= 0.0 {
            return;
        }

        let (mx, my) = ((x1 + x2) / 2.0, (y1 + y2) / 2.0);
        let rect = Rect::new(mx - length / 2.0, my - width / 2.0, length, width);
        let z = self.z_offset;
        let packed = pack_argb(color, self.global_alpha);
        // Clipping would move the pivot off the segment's midpoint.
        if let Some(quad) = textured_quad(rect.into(), rect, UvExtent::FULL, packed, false, z) {
            self.push_quad(quad, blank, dy.atan2(dx).to_degrees());
        }
    }

    // ── text ────────────────────────────────────────────────────────────────

    /// Bounds of `text` drawn at `(x, y)` with a pixel height of `height`.
    pub fn text_bounds(
        &self,
        fonts: &FontSystem,
        font: FontId,
        text: &str,
        x: f32,
        y: f32,
        height: f32,
    ) -> Rect {
        let size = fonts.measure(text, font, height);
        Rect::new(x, y, size.x, size.y)
    }

    /// Draws `text` with its top-left corner at `(x, y)`.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_text(
        &mut self,
        fonts: &FontSystem,
        font: FontId,
        text: &str,
        x: f32,
        y: f32,
        height: f32,
        color: ColorRgba,
    ) {
        let Some(entry) = self.text_texture(fonts, font, text, height) else { return };
        let rect = DrawRect::new(x, y, entry.width as f32, entry.height as f32);
        self.draw_texture_with(entry.handle, DrawParams::new(rect).color(color));
    }

    fn text_texture(
        &mut self,
        fonts: &FontSystem,
        font: FontId,
        text: &str,
        height: f32,
    ) -> Option<TextEntry> {
        if text.is_empty() || height <= 0.0 {
            return None;
        }
        if let Some(entry) = self.text.get(font, height, text, self.frame_index) {
            return Some(entry);
        }

        let bitmap = fonts.rasterize(text, font, height)?;
        match self.create_texture(bitmap.width, bitmap.height, &bitmap.pixels) {
            Ok(handle) => {
                let size = (bitmap.width, bitmap.height);
                Some(self.text.insert(font, height, text, handle, size, self.frame_index))
            }
            Err(e) => {
                log::error!("text texture for {text:?} failed: {e}");
                if e.is_fatal() {
                    self.fatal.get_or_insert(e);
                }
                None
            }
        }
    }

    // ── frame capture ───────────────────────────────────────────────────────

    fn read_back(&mut self) -> RenderResult<FramePixels> {
        self.require_device()?;
        self.batch.flush(self.device.backend_mut());
        Ok(self.device.backend_mut().read_back_buffer()?)
    }

    /// Copies what has been drawn so far into a new texture.
    pub fn copy_screen(&mut self) -> RenderResult<TextureHandle> {
        let frame = self.read_back()?;
        self.create_texture(frame.width, frame.height, &frame.pixels)
    }

    /// Copies the screen into `handle`, updating it in place when it has
    /// the back buffer's size and replacing it otherwise.
    pub fn copy_screen_into(&mut self, handle: &mut TextureHandle) -> RenderResult<()> {
        let frame = self.read_back()?;

        let same_size = self
            .textures
            .record(*handle)
            .is_some_and(|r| r.width == frame.width && r.height == frame.height);
        if same_size && self.update_texture(*handle, &frame.pixels) {
            return Ok(());
        }

        self.release_texture(*handle);
        *handle = self.create_texture(frame.width, frame.height, &frame.pixels)?;
        Ok(())
    }

    /// Saves the back buffer as the next free `Screenshot_NNNNN.bmp` in
    /// `dir`.
    pub fn make_screenshot(&mut self, dir: impl AsRef<Path>) -> RenderResult<PathBuf> {
        let frame = self.read_back()?;
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = screenshot::next_screenshot_path(dir)?;
        screenshot::save_frame(&path, &frame)?;
        log::info!("screenshot saved to {}", path.display());
        Ok(path)
    }
}
