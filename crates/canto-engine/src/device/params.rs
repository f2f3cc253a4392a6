use crate::config::AntiAliasing;

/// When the back buffer is presented.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PresentInterval {
    /// Wait for vertical blank.
    Default,
    /// Present as soon as possible.
    Immediate,
}

impl PresentInterval {
    pub fn from_vsync(vsync: bool) -> Self {
        if vsync { PresentInterval::Default } else { PresentInterval::Immediate }
    }
}

/// Back buffer and presentation settings handed to the backend on device
/// creation and on every reset.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PresentParams {
    pub back_buffer_width: u32,
    pub back_buffer_height: u32,
    pub windowed: bool,
    pub multisample: AntiAliasing,
    pub interval: PresentInterval,
}

impl PresentParams {
    pub fn sample_count(&self) -> u32 {
        self.multisample.samples()
    }
}
