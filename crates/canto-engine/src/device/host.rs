/// Window operations needed for borderless fullscreen.
pub trait WindowHost {
    /// Client area in physical pixels.
    fn client_size(&self) -> (u32, u32);
    fn set_client_size(&mut self, width: u32, height: u32);
    /// Position and size of the display hosting the window, if known.
    fn display_bounds(&self) -> Option<DisplayBounds>;
    fn set_position(&mut self, x: i32, y: i32);
    fn set_decorated(&mut self, decorated: bool);
    /// Centres the window on its display.
    fn center(&mut self);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DisplayBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}
