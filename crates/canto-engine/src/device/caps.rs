/// Capabilities probed from the adapter before device creation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DeviceCaps {
    /// Textures may have any size; otherwise they are padded to powers of two.
    pub non_pow2_textures: bool,
    /// Vertex transformation runs on the GPU.
    pub hw_transform_lighting: bool,
    /// Largest texture edge the device accepts.
    pub max_texture_size: u32,
}

impl Default for DeviceCaps {
    fn default() -> Self {
        Self { non_pow2_textures: true, hw_transform_lighting: true, max_texture_size: 8192 }
    }
}

/// How vertices are processed by the created device.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VertexProcessing {
    Hardware,
    Software,
}

impl DeviceCaps {
    pub fn vertex_processing(&self) -> VertexProcessing {
        if self.hw_transform_lighting {
            VertexProcessing::Hardware
        } else {
            VertexProcessing::Software
        }
    }
}
