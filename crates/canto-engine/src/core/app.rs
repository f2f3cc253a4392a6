use winit::event::WindowEvent;

use super::ctx::{Commands, FrameCtx};
use crate::device::{GpuBackend, WindowHost};
use crate::render::{FrameOutcome, Renderer};
use crate::time::FrameTime;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract driven by the runtime.
///
/// Callbacks are generic over the backend so the same application runs on
/// a window or headless.
pub trait App {
    /// Called once after the device is ready. Load textures here.
    fn on_init<B: GpuBackend>(&mut self, renderer: &mut Renderer<B>) -> anyhow::Result<()> {
        let _ = renderer;
        Ok(())
    }

    /// Raw window events, before the runtime handles resize and close.
    fn on_window_event(&mut self, event: &WindowEvent, commands: &mut Commands) -> AppControl {
        let _ = (event, commands);
        AppControl::Continue
    }

    /// Draw phase: between begin and end of the scene.
    fn on_draw<B: GpuBackend>(&mut self, ctx: &mut FrameCtx<'_, B>);

    /// Update phase: after the scene ends, before present.
    fn on_update<B: GpuBackend>(&mut self, ctx: &mut FrameCtx<'_, B>) -> AppControl {
        let _ = ctx;
        AppControl::Continue
    }

    /// Called once before the renderer is unloaded.
    fn on_exit<B: GpuBackend>(&mut self, renderer: &mut Renderer<B>) {
        let _ = renderer;
    }
}

/// The app and command buffer, shared by both frame phases.
struct Phases<'a, A> {
    app: &'a mut A,
    commands: &'a mut Commands,
}

/// Runs one renderer frame with `app` as its draw and update phases.
///
/// Screenshot commands queued so far are served in the update phase. An
/// update that returns [`AppControl::Exit`] queues an exit command.
pub fn run_frame<A, B, H>(
    app: &mut A,
    renderer: &mut Renderer<B>,
    host: &mut H,
    time: FrameTime,
    commands: &mut Commands,
) -> FrameOutcome
where
    A: App,
    B: GpuBackend,
    H: WindowHost + ?Sized,
{
    let mut phases = Phases { app, commands };
    renderer.frame_with(
        host,
        &mut phases,
        |renderer, p| {
            let mut ctx = FrameCtx { renderer, time, commands: p.commands };
            p.app.on_draw(&mut ctx);
        },
        |renderer, p| {
            let mut ctx = FrameCtx { renderer: &mut *renderer, time, commands: &mut *p.commands };
            if p.app.on_update(&mut ctx) == AppControl::Exit {
                p.commands.exit();
            }

            for dir in p.commands.take_screenshots() {
                if let Err(e) = renderer.make_screenshot(&dir) {
                    log::error!("screenshot to {} failed: {e}", dir.display());
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::config::RendererConfig;
    use crate::coords::{ColorRgba, Rect};
    use crate::device::headless::{Call, HeadlessBackend, HeadlessWindow};
    use crate::core::Command;

    #[derive(Default)]
    struct Scripted {
        draws: u32,
        updates: u32,
        exit_after: Option<u32>,
    }

    impl App for Scripted {
        fn on_draw<B: GpuBackend>(&mut self, ctx: &mut FrameCtx<'_, B>) {
            self.draws += 1;
            ctx.renderer.draw_color(ColorRgba::white(), Rect::new(0.0, 0.0, 10.0, 10.0));
        }

        fn on_update<B: GpuBackend>(&mut self, ctx: &mut FrameCtx<'_, B>) -> AppControl {
            self.updates += 1;
            if self.updates == 2 {
                ctx.commands.toggle_fullscreen();
            }
            match self.exit_after {
                Some(n) if self.updates >= n => AppControl::Exit,
                _ => AppControl::Continue,
            }
        }
    }

    fn frame_time(frame_index: u64) -> FrameTime {
        FrameTime { dt: 1.0 / 60.0, elapsed: 0.0, now: Instant::now(), frame_index, fps: 60.0 }
    }

    #[test]
    fn phases_run_in_order_and_exit_is_queued() {
        let mut renderer = Renderer::new(HeadlessBackend::default(), RendererConfig::default());
        renderer.init((1280, 720)).unwrap();
        let mut host = HeadlessWindow::new(1280, 720);
        let mut app = Scripted { exit_after: Some(3), ..Default::default() };

        for i in 0..3 {
            let mut commands = Commands::default();
            let time = frame_time(i);
            let outcome = run_frame(&mut app, &mut renderer, &mut host, time, &mut commands);
            assert_eq!(outcome, FrameOutcome::Presented);

            let queued = commands.drain();
            match i {
                1 => assert_eq!(queued, vec![Command::ToggleFullscreen]),
                2 => assert_eq!(queued, vec![Command::Exit]),
                _ => assert!(queued.is_empty()),
            }
        }

        assert_eq!((app.draws, app.updates), (3, 3));
        assert_eq!(renderer.backend().count(|c| matches!(c, Call::DrawQuad(_))), 3);
    }

    #[test]
    fn screenshot_command_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut renderer = Renderer::new(HeadlessBackend::default(), RendererConfig::default());
        renderer.init((320, 180)).unwrap();
        let mut host = HeadlessWindow::new(320, 180);
        let mut app = Scripted::default();

        let mut commands = Commands::default();
        commands.screenshot(dir.path());
        run_frame(&mut app, &mut renderer, &mut host, frame_time(0), &mut commands);

        assert!(commands.is_empty());
        assert!(dir.path().join("Screenshot_00000.bmp").exists());
    }
}
