use std::fmt;

/// Integer reference to a texture owned by the renderer.
///
/// Valid handles are non-negative. [`TextureHandle::INVALID`] (`-1`) is the
/// "no texture" sentinel returned by failed creations.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub i32);

impl TextureHandle {
    pub const INVALID: TextureHandle = TextureHandle(-1);

    #[inline]
    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }

    #[inline]
    pub(crate) fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl Default for TextureHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for TextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
