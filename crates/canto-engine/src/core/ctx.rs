use std::path::PathBuf;

use crate::device::GpuBackend;
use crate::render::Renderer;
use crate::time::FrameTime;

/// Runtime request buffered during a callback and applied after it returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Exit,
    SetFullscreen(bool),
    ToggleFullscreen,
    /// Saves the frame being rendered to a numbered file in the directory.
    /// Taken in the update phase, after the scene is complete.
    Screenshot(PathBuf),
}

#[derive(Debug, Default)]
pub struct Commands {
    queue: Vec<Command>,
}

impl Commands {
    pub fn exit(&mut self) {
        self.queue.push(Command::Exit);
    }

    pub fn set_fullscreen(&mut self, fullscreen: bool) {
        self.queue.push(Command::SetFullscreen(fullscreen));
    }

    pub fn toggle_fullscreen(&mut self) {
        self.queue.push(Command::ToggleFullscreen);
    }

    pub fn screenshot(&mut self, dir: impl Into<PathBuf>) {
        self.queue.push(Command::Screenshot(dir.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn drain(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.queue)
    }

    /// Removes queued screenshot requests, keeping the other commands.
    pub(crate) fn take_screenshots(&mut self) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        self.queue.retain(|cmd| match cmd {
            Command::Screenshot(dir) => {
                dirs.push(dir.clone());
                false
            }
            _ => true,
        });
        dirs
    }
}

/// Per-frame context passed to [`App::on_draw`](super::App::on_draw) and
/// [`App::on_update`](super::App::on_update).
pub struct FrameCtx<'a, B: GpuBackend> {
    pub renderer: &'a mut Renderer<B>,
    pub time: FrameTime,
    pub commands: &'a mut Commands,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_drain_in_order() {
        let mut commands = Commands::default();
        commands.toggle_fullscreen();
        commands.screenshot("shots");
        commands.exit();

        assert_eq!(
            commands.drain(),
            vec![
                Command::ToggleFullscreen,
                Command::Screenshot(PathBuf::from("shots")),
                Command::Exit
            ]
        );
        assert!(commands.is_empty());
    }

    #[test]
    fn screenshots_are_taken_out() {
        let mut commands = Commands::default();
        commands.screenshot("a");
        commands.exit();
        commands.screenshot("b");

        assert_eq!(commands.take_screenshots(), vec![PathBuf::from("a"), PathBuf::from("b")]);
        assert_eq!(commands.drain(), vec![Command::Exit]);
    }
}
