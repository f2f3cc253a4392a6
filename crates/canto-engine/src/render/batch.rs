use glam::Mat4;

use super::{Vertex, VERTICES_PER_QUAD};
use crate::device::{GpuBackend, GpuTextureId, TransformKind};

/// Quads collected during a frame, drawn in submission order.
///
/// Vertices, textures and transforms are parallel queues consumed in
/// lockstep by [`flush`](Self::flush).
#[derive(Debug)]
pub struct QuadBatch {
    capacity: usize,
    vertices: Vec<Vertex>,
    textures: Vec<GpuTextureId>,
    transforms: Vec<Mat4>,
}

impl QuadBatch {
    /// `capacity` is in quads; the backend's vertex buffer must hold
    /// `4 * capacity` vertices.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            vertices: Vec::with_capacity(capacity * VERTICES_PER_QUAD),
            textures: Vec::with_capacity(capacity),
            transforms: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Queued quads.
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Queues a quad, flushing first when the batch is full.
    pub fn push<B: GpuBackend + ?Sized>(
        &mut self,
        gpu: &mut B,
        quad: [Vertex; 4],
        texture: GpuTextureId,
        transform: Mat4,
    ) {
        if self.len() >= self.capacity {
            self.flush(gpu);
        }
        self.vertices.extend_from_slice(&quad);
        self.textures.push(texture);
        self.transforms.push(transform);
    }

    /// Uploads all queued vertices in one write and issues one draw per
    /// quad. Returns the number of quads drawn. Failures are logged and
    /// the batch is emptied either way.
    pub fn flush<B: GpuBackend + ?Sized>(&mut self, gpu: &mut B) -> usize {
        if self.is_empty() {
            return 0;
        }

        if let Err(e) = gpu.write_vertices(&self.vertices) {
            log::error!("vertex upload failed, dropping {} quads: {e}", self.len());
            self.clear();
            return 0;
        }

        let mut drawn = 0;
        for (i, (&texture, &transform)) in self.textures.iter().zip(&self.transforms).enumerate() {
            if let Err(e) = gpu.set_transform(TransformKind::World, transform) {
                log::error!("set world transform: {e}");
            }
            if let Err(e) = gpu.set_texture(Some(texture)) {
                log::error!("bind texture: {e}");
            }
            match gpu.draw_quad((i * VERTICES_PER_QUAD) as u32) {
                Ok(()) => drawn += 1,
                Err(e) => log::error!("draw quad {i}: {e}"),
            }
        }

        log::trace!("flushed {drawn} quads");
        self.clear();
        drawn
    }

    /// Drops queued quads without drawing them.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.textures.clear();
        self.transforms.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RendererConfig;
    use crate::device::headless::{Call, HeadlessBackend};
    use crate::device::{DeviceManager, GpuBackend};

    fn device(batch_quads: usize) -> DeviceManager<HeadlessBackend> {
        let config = RendererConfig { batch_quads, ..Default::default() };
        let mut dm = DeviceManager::new(HeadlessBackend::default(), &config);
        dm.create((640, 360)).unwrap();
        dm.setup();
        dm.backend_mut().take_calls();
        dm
    }

    fn quad(tag: f32) -> [Vertex; 4] {
        [Vertex::new(tag, 0.0, 0.0, 0.0, 0.0, 0); 4]
    }

    #[test]
    fn flush_writes_once_and_draws_in_order() {
        let mut dm = device(8);
        let gpu = dm.backend_mut();
        let a = gpu.create_texture(1, 1).unwrap();
        let b = gpu.create_texture(1, 1).unwrap();

        let mut batch = QuadBatch::new(8);
        batch.push(gpu, quad(1.0), a, Mat4::IDENTITY);
        batch.push(gpu, quad(2.0), b, Mat4::IDENTITY);
        batch.push(gpu, quad(3.0), a, Mat4::IDENTITY);
        assert_eq!(batch.flush(gpu), 3);
        assert!(batch.is_empty());

        assert_eq!(gpu.count(|c| matches!(c, Call::WriteVertices(_))), 1);
        let draws = gpu.draws();
        let tags: Vec<f32> = draws.iter().map(|d| d.vertices[0].position[0]).collect();
        assert_eq!(tags, vec![1.0, 2.0, 3.0]);
        assert_eq!(draws[1].texture, Some(b));

        let bases: Vec<u32> = gpu
            .calls()
            .iter()
            .filter_map(|c| if let Call::DrawQuad(base) = c { Some(*base) } else { None })
            .collect();
        assert_eq!(bases, vec![0, 4, 8]);
    }

    #[test]
    fn overflow_flushes_exactly_once_before_accepting() {
        let mut dm = device(2);
        let gpu = dm.backend_mut();
        let t = gpu.create_texture(1, 1).unwrap();

        let mut batch = QuadBatch::new(2);
        batch.push(gpu, quad(1.0), t, Mat4::IDENTITY);
        batch.push(gpu, quad(2.0), t, Mat4::IDENTITY);
        assert_eq!(gpu.count(|c| matches!(c, Call::WriteVertices(_))), 0);

        batch.push(gpu, quad(3.0), t, Mat4::IDENTITY);
        assert_eq!(gpu.count(|c| matches!(c, Call::WriteVertices(_))), 1);
        assert_eq!(gpu.draws().len(), 2);
        assert_eq!(batch.len(), 1);

        batch.flush(gpu);
        let tags: Vec<f32> = gpu.draws().iter().map(|d| d.vertices[0].position[0]).collect();
        assert_eq!(tags, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn transform_is_applied_per_quad() {
        let mut dm = device(4);
        let gpu = dm.backend_mut();
        let t = gpu.create_texture(1, 1).unwrap();
        let spin = Mat4::from_rotation_z(1.0);

        let mut batch = QuadBatch::new(4);
        batch.push(gpu, quad(1.0), t, Mat4::IDENTITY);
        batch.push(gpu, quad(2.0), t, spin);
        batch.flush(gpu);

        assert_eq!(gpu.draws()[0].world, Mat4::IDENTITY);
        assert_eq!(gpu.draws()[1].world, spin);
    }

    #[test]
    fn failed_draws_are_logged_and_batch_continues() {
        let mut dm = device(4);
        let gpu = dm.backend_mut();
        let live = gpu.create_texture(1, 1).unwrap();

        let mut batch = QuadBatch::new(4);
        batch.push(gpu, quad(1.0), GpuTextureId(999), Mat4::IDENTITY);
        batch.push(gpu, quad(2.0), live, Mat4::IDENTITY);
        // Binding the unknown texture fails, the draw itself still happens.
        assert_eq!(batch.flush(gpu), 2);
        assert!(batch.is_empty());
    }
}
