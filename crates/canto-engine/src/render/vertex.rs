use bytemuck::{Pod, Zeroable};

/// One corner of a batched quad.
///
/// `color` is packed `0xAARRGGBB`; in memory (little-endian) the bytes are
/// B, G, R, A, which the shader swizzles back.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub color: u32,
}

impl Vertex {
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32, u: f32, v: f32, color: u32) -> Self {
        Self { position: [x, y, z], uv: [u, v], color }
    }

    #[inline]
    pub fn alpha(&self) -> u8 {
        (self.color >> 24) as u8
    }
}

/// Two triangles over the four corners of a quad.
pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

pub const VERTICES_PER_QUAD: usize = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_24_bytes() {
        assert_eq!(std::mem::size_of::<Vertex>(), 24);
    }

    #[test]
    fn color_bytes_are_bgra_in_memory() {
        let v = Vertex::new(0.0, 0.0, 0.0, 0.0, 0.0, 0x8011_2233);
        let bytes = bytemuck::bytes_of(&v);
        assert_eq!(&bytes[20..24], &[0x33, 0x22, 0x11, 0x80]);
        assert_eq!(v.alpha(), 0x80);
    }
}
