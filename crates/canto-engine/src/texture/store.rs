use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use super::loader;
use super::{IdAllocator, PendingUpload, TextureHandle, TextureRecord, UploadQueue};
use crate::config::TextureQuality;
use crate::coords::{ColorRgba, DrawRect};
use crate::device::{upload_texture, write_texture, GpuBackend, GpuTextureId};
use crate::error::{RenderError, RenderResult};
use crate::texture::record::padded_extent;

/// Failed realizations of a queued upload before the texture is dropped.
pub const MAX_UPLOAD_ATTEMPTS: u32 = 3;

/// GPU side of a texture.
#[derive(Debug, Default)]
struct GpuSlot {
    /// `None` while the upload is still queued.
    object: Option<GpuTextureId>,
    /// Last uploaded pixels, used to rebuild the object after a reset.
    shadow: Vec<u8>,
}

#[derive(Debug)]
struct ResourceTable {
    ids: IdAllocator,
    records: HashMap<TextureHandle, TextureRecord>,
    slots: HashMap<TextureHandle, GpuSlot>,
    pending: UploadQueue,
    /// Objects whose handle was released; destroyed on the render thread.
    retired: Vec<GpuTextureId>,
    non_pow2: bool,
    next_serial: u64,
}

impl ResourceTable {
    fn insert(&mut self, width: u32, height: u32, slot: GpuSlot) -> RenderResult<TextureRecord> {
        let handle = self.ids.acquire()?;
        let serial = self.next_serial;
        self.next_serial += 1;

        let record = TextureRecord::new(handle, width, height, self.non_pow2, serial);
        self.records.insert(handle, record.clone());
        self.slots.insert(handle, slot);
        Ok(record)
    }

    fn is_current(&self, handle: TextureHandle, serial: u64) -> bool {
        self.records.get(&handle).is_some_and(|r| r.serial == serial)
    }
}

/// What a draw call needs from a texture.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TextureSample {
    pub object: GpuTextureId,
    pub width_ratio: f32,
    pub height_ratio: f32,
    pub rect: DrawRect,
    pub color: ColorRgba,
}

/// Texture table, GPU texture pool, handle allocator and upload queue behind
/// a single mutex.
///
/// Cloning is cheap and shares the same table, so producers on other
/// threads (decoders, loaders) can queue uploads and release handles. GPU
/// work only happens in the methods taking a backend, which the render
/// thread calls; the lock is never held across a backend call.
#[derive(Debug, Clone)]
pub struct TextureStore {
    inner: Arc<Mutex<ResourceTable>>,
}

impl TextureStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ResourceTable {
                ids: IdAllocator::new(capacity),
                records: HashMap::new(),
                slots: HashMap::new(),
                pending: UploadQueue::default(),
                retired: Vec::new(),
                non_pow2: true,
                next_serial: 0,
            })),
        }
    }

    /// Set once from the probed device caps.
    pub fn set_non_pow2(&self, supported: bool) {
        self.inner.lock().non_pow2 = supported;
    }

    pub fn non_pow2(&self) -> bool {
        self.inner.lock().non_pow2
    }

    // ── creation ────────────────────────────────────────────────────────────

    /// Creates a texture from BGRA8 pixels and uploads it immediately.
    pub fn create_from_pixels<B: GpuBackend + ?Sized>(
        &self,
        gpu: &mut B,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> RenderResult<TextureHandle> {
        let len = check_pixels(width, height, pixels)?;
        let padded = padded_extent(width, height, self.non_pow2());

        let object = upload_texture(gpu, padded, width, height, pixels)?;

        let inserted = {
            let mut table = self.inner.lock();
            table.insert(
                width,
                height,
                GpuSlot { object: Some(object), shadow: pixels[..len].to_vec() },
            )
        };

        match inserted {
            Ok(record) => {
                log::trace!("texture {} created ({}x{})", record.handle, width, height);
                Ok(record.handle)
            }
            Err(e) => {
                let _ = gpu.destroy_texture(object);
                Err(e)
            }
        }
    }

    /// Loads an image file, downsizes it to the quality bound and uploads it.
    ///
    /// A missing or undecodable file is logged and yields
    /// [`TextureHandle::INVALID`]; only fatal conditions are returned as
    /// errors.
    pub fn create_from_file<B: GpuBackend + ?Sized>(
        &self,
        gpu: &mut B,
        path: &Path,
        quality: TextureQuality,
    ) -> RenderResult<TextureHandle> {
        let image = match loader::load_bgra(path, quality.max_size()) {
            Ok(image) => image,
            Err(e) => {
                log::error!("cannot load texture {}: {e}", path.display());
                return Ok(TextureHandle::INVALID);
            }
        };

        match self.create_from_pixels(gpu, image.width, image.height, &image.pixels) {
            Ok(handle) => {
                if let Some(record) = self.inner.lock().records.get_mut(&handle) {
                    record.path = Some(path.to_path_buf());
                }
                Ok(handle)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                log::error!("cannot create texture from {}: {e}", path.display());
                Ok(TextureHandle::INVALID)
            }
        }
    }

    /// Allocates a handle and record now and defers the GPU upload to
    /// [`drain_one`](Self::drain_one). Callable from any thread.
    pub fn queue_upload(
        &self,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> RenderResult<TextureHandle> {
        let len = check_pixels(width, height, pixels)?;
        let pixels = pixels[..len].to_vec();

        let mut table = self.inner.lock();
        let record = table.insert(width, height, GpuSlot::default())?;
        table.pending.push(PendingUpload {
            handle: record.handle,
            width,
            height,
            pixels,
            serial: record.serial,
            attempts: 0,
        });
        Ok(record.handle)
    }

    // ── per-frame work ──────────────────────────────────────────────────────

    /// Realizes the oldest queued upload. Returns its handle, or `None` when
    /// nothing was realized.
    ///
    /// A failed upload stays at the head of the queue for the next frame.
    /// After [`MAX_UPLOAD_ATTEMPTS`] failures the texture is removed and its
    /// handle returned to the pool.
    pub fn drain_one<B: GpuBackend + ?Sized>(&self, gpu: &mut B) -> Option<TextureHandle> {
        let (upload, padded) = self.next_pending()?;

        match upload_texture(gpu, padded, upload.width, upload.height, &upload.pixels) {
            Ok(object) => self.install(gpu, upload, object),
            Err(e) => {
                log::error!("queued upload for {} failed: {e}", upload.handle);
                self.requeue_or_abandon(upload);
                None
            }
        }
    }

    /// Pops the oldest upload whose record is still current.
    fn next_pending(&self) -> Option<(PendingUpload, (u32, u32))> {
        let mut table = self.inner.lock();
        loop {
            let upload = table.pending.pop()?;
            if let Some(record) = table.records.get(&upload.handle)
                && record.serial == upload.serial
            {
                let padded = (record.padded_width, record.padded_height);
                return Some((upload, padded));
            }
            log::trace!("dropping orphaned upload for {}", upload.handle);
        }
    }

    /// Binds a freshly uploaded object to its record, unless the handle was
    /// released (and maybe reissued) while the upload ran.
    fn install<B: GpuBackend + ?Sized>(
        &self,
        gpu: &mut B,
        upload: PendingUpload,
        object: GpuTextureId,
    ) -> Option<TextureHandle> {
        let mut table = self.inner.lock();
        if !table.is_current(upload.handle, upload.serial) {
            drop(table);
            let _ = gpu.destroy_texture(object);
            return None;
        }

        if let Some(slot) = table.slots.get_mut(&upload.handle) {
            slot.object = Some(object);
            slot.shadow = upload.pixels;
        }
        Some(upload.handle)
    }

    fn requeue_or_abandon(&self, mut upload: PendingUpload) {
        let mut table = self.inner.lock();
        if !table.is_current(upload.handle, upload.serial) {
            return;
        }

        upload.attempts += 1;
        if upload.attempts < MAX_UPLOAD_ATTEMPTS {
            table.pending.push_front(upload);
            return;
        }

        let handle = upload.handle;
        table.records.remove(&handle);
        table.slots.remove(&handle);
        table.ids.release(handle);
        log::error!("giving up on texture {handle} after {MAX_UPLOAD_ATTEMPTS} failed uploads");
    }

    /// Destroys GPU objects of textures released since the last call.
    pub fn collect_retired<B: GpuBackend + ?Sized>(&self, gpu: &mut B) -> usize {
        let retired = std::mem::take(&mut self.inner.lock().retired);
        for &object in &retired {
            if let Err(e) = gpu.destroy_texture(object) {
                log::error!("destroy texture failed: {e}");
            }
        }
        retired.len()
    }

    /// Rebuilds every realized GPU object from its shadow copy after a
    /// device reset. Records and handles are untouched.
    pub fn recreate_all<B: GpuBackend + ?Sized>(&self, gpu: &mut B) -> usize {
        let jobs: Vec<_> = {
            let mut table = self.inner.lock();
            // Objects of the old device are gone with it.
            table.retired.clear();

            let ResourceTable { records, slots, .. } = &mut *table;
            slots
                .iter_mut()
                .filter_map(|(handle, slot)| {
                    slot.object.take()?;
                    let record = records.get(handle)?;
                    Some((record.clone(), slot.shadow.clone()))
                })
                .collect()
        };

        let mut rebuilt = 0;
        for (record, shadow) in jobs {
            let padded = (record.padded_width, record.padded_height);
            let object = match upload_texture(gpu, padded, record.width, record.height, &shadow) {
                Ok(object) => object,
                Err(e) => {
                    log::error!("recreating texture {} failed: {e}", record.handle);
                    continue;
                }
            };

            let installed = {
                let mut guard = self.inner.lock();
                let table = &mut *guard;
                let current = table.is_current(record.handle, record.serial);
                match table.slots.get_mut(&record.handle) {
                    Some(slot) if current => {
                        slot.object = Some(object);
                        true
                    }
                    _ => false,
                }
            };

            if installed {
                rebuilt += 1;
            } else {
                let _ = gpu.destroy_texture(object);
            }
        }

        log::debug!("recreated {rebuilt} textures");
        rebuilt
    }

    // ── mutation ────────────────────────────────────────────────────────────

    /// Re-uploads pixels into an existing texture. Dimensions are not
    /// changed. Returns `false` for unknown handles, textures whose upload
    /// is still queued, short buffers or failed uploads.
    pub fn update<B: GpuBackend + ?Sized>(
        &self,
        gpu: &mut B,
        handle: TextureHandle,
        pixels: &[u8],
    ) -> bool {
        let target = {
            let table = self.inner.lock();
            table.records.get(&handle).and_then(|record| {
                let object = table.slots.get(&handle)?.object?;
                Some((object, record.width, record.height, record.serial))
            })
        };
        let Some((object, width, height, serial)) = target else {
            return false;
        };

        let len = match check_pixels(width, height, pixels) {
            Ok(len) => len,
            Err(e) => {
                log::error!("update of {handle} rejected: {e}");
                return false;
            }
        };

        if let Err(e) = write_texture(gpu, object, width, height, pixels) {
            log::error!("update of {handle} failed: {e}");
            return false;
        }

        let mut table = self.inner.lock();
        if !table.is_current(handle, serial) {
            return false;
        }
        if let Some(slot) = table.slots.get_mut(&handle) {
            slot.shadow.clear();
            slot.shadow.extend_from_slice(&pixels[..len]);
        }
        true
    }

    /// Removes the texture and returns its handle to the pool. The GPU
    /// object is retired for [`collect_retired`](Self::collect_retired).
    /// Unknown or invalid handles are a no-op returning `false`.
    pub fn release(&self, handle: TextureHandle) -> bool {
        if !handle.is_valid() {
            return false;
        }

        let mut table = self.inner.lock();
        if table.records.remove(&handle).is_none() {
            return false;
        }
        if let Some(object) = table.slots.remove(&handle).and_then(|s| s.object) {
            table.retired.push(object);
        }
        table.pending.purge(handle);
        table.ids.release(handle);
        log::trace!("texture {handle} released");
        true
    }

    /// Sets the default destination and tint used by `draw_texture(handle)`.
    pub fn set_defaults(&self, handle: TextureHandle, rect: DrawRect, color: ColorRgba) -> bool {
        match self.inner.lock().records.get_mut(&handle) {
            Some(record) => {
                record.rect = rect;
                record.color = color;
                true
            }
            None => false,
        }
    }

    /// Destroys every GPU object and forgets every texture.
    pub fn unload<B: GpuBackend + ?Sized>(&self, gpu: &mut B) {
        let objects: Vec<_> = {
            let mut table = self.inner.lock();
            let mut objects: Vec<_> = table.slots.drain().filter_map(|(_, s)| s.object).collect();
            objects.append(&mut table.retired);
            table.records.clear();
            table.pending.clear();
            table.ids.clear();
            objects
        };

        for object in objects {
            let _ = gpu.destroy_texture(object);
        }
    }

    // ── queries ─────────────────────────────────────────────────────────────

    pub fn exists(&self, handle: TextureHandle) -> bool {
        handle.is_valid() && self.inner.lock().records.contains_key(&handle)
    }

    /// True once the texture has a GPU object.
    pub fn is_realized(&self, handle: TextureHandle) -> bool {
        self.gpu_object(handle).is_some()
    }

    pub fn gpu_object(&self, handle: TextureHandle) -> Option<GpuTextureId> {
        self.inner.lock().slots.get(&handle).and_then(|s| s.object)
    }

    pub fn record(&self, handle: TextureHandle) -> Option<TextureRecord> {
        self.inner.lock().records.get(&handle).cloned()
    }

    /// Draw data for a realized texture.
    pub fn sample(&self, handle: TextureHandle) -> Option<TextureSample> {
        let table = self.inner.lock();
        let record = table.records.get(&handle)?;
        let object = table.slots.get(&handle)?.object?;
        Some(TextureSample {
            object,
            width_ratio: record.width_ratio,
            height_ratio: record.height_ratio,
            rect: record.rect,
            color: record.color,
        })
    }

    /// Live texture records.
    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_uploads(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn available_handles(&self) -> usize {
        self.inner.lock().ids.available()
    }
}

/// Validates dimensions and buffer length; returns the byte count used.
fn check_pixels(width: u32, height: u32, pixels: &[u8]) -> RenderResult<usize> {
    if width == 0 || height == 0 {
        return Err(RenderError::InvalidDimensions { width, height });
    }
    let expected = 4 * width as usize * height as usize;
    if pixels.len() < expected {
        return Err(RenderError::PixelBufferTooSmall { expected, actual: pixels.len() });
    }
    Ok(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AntiAliasing;
    use crate::device::headless::HeadlessBackend;
    use crate::device::{DeviceCaps, PresentInterval, PresentParams, VertexProcessing};

    fn backend(caps: DeviceCaps) -> HeadlessBackend {
        let mut gpu = HeadlessBackend::new(caps);
        let params = PresentParams {
            back_buffer_width: 64,
            back_buffer_height: 64,
            windowed: true,
            multisample: AntiAliasing::None,
            interval: PresentInterval::Immediate,
        };
        gpu.create_device(&params, VertexProcessing::Hardware).unwrap();
        gpu
    }

    #[test]
    fn failed_upload_is_retried_then_dropped() {
        let store = TextureStore::new(4);
        let mut gpu = backend(DeviceCaps { max_texture_size: 4, ..Default::default() });
        let h = store.queue_upload(8, 8, &[0; 8 * 8 * 4]).unwrap();

        for _ in 1..MAX_UPLOAD_ATTEMPTS {
            assert_eq!(store.drain_one(&mut gpu), None);
            assert!(store.exists(h));
            assert_eq!(store.pending_uploads(), 1);
        }

        assert_eq!(store.drain_one(&mut gpu), None);
        assert!(!store.exists(h));
        assert_eq!(store.pending_uploads(), 0);
        assert_eq!(store.available_handles(), 4);
        assert_eq!(store.queue_upload(2, 2, &[0; 16]).unwrap(), h);
    }

    #[test]
    fn upload_for_reissued_handle_is_discarded() {
        let store = TextureStore::new(4);
        let mut gpu = backend(DeviceCaps::default());
        let first = store.queue_upload(1, 1, &[1; 4]).unwrap();

        let (upload, padded) = store.next_pending().unwrap();
        assert!(store.release(first));
        let second = store.queue_upload(1, 1, &[2; 4]).unwrap();
        assert_eq!(second, first);

        let object = upload_texture(&mut gpu, padded, 1, 1, &upload.pixels).unwrap();
        assert_eq!(store.install(&mut gpu, upload, object), None);
        assert!(!gpu.has_texture(object));
        assert!(!store.is_realized(second));

        assert_eq!(store.drain_one(&mut gpu), Some(second));
        let object = store.gpu_object(second).unwrap();
        assert_eq!(gpu.read_texture(object, 1, 1).unwrap(), vec![2; 4]);
    }
}
