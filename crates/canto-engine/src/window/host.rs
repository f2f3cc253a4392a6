use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::window::Window;

use crate::device::{DisplayBounds, WindowHost};

/// [`WindowHost`] over a winit window.
pub struct WinitHost<'a> {
    window: &'a Window,
}

impl<'a> WinitHost<'a> {
    pub fn new(window: &'a Window) -> Self {
        Self { window }
    }
}

impl WindowHost for WinitHost<'_> {
    fn client_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    fn set_client_size(&mut self, width: u32, height: u32) {
        // The platform may apply the size later; the resize event follows.
        let _ = self.window.request_inner_size(PhysicalSize::new(width, height));
    }

    fn display_bounds(&self) -> Option<DisplayBounds> {
        let monitor = self.window.current_monitor()?;
        let pos = monitor.position();
        let size = monitor.size();
        Some(DisplayBounds { x: pos.x, y: pos.y, width: size.width, height: size.height })
    }

    fn set_position(&mut self, x: i32, y: i32) {
        self.window.set_outer_position(PhysicalPosition::new(x, y));
    }

    fn set_decorated(&mut self, decorated: bool) {
        self.window.set_decorations(decorated);
    }

    fn center(&mut self) {
        let Some(display) = self.display_bounds() else { return };
        let outer = self.window.outer_size();
        let x = display.x + (display.width as i32 - outer.width as i32) / 2;
        let y = display.y + (display.height as i32 - outer.height as i32) / 2;
        self.set_position(x, y);
    }
}
