use std::time::Instant;

use anyhow::{Context, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use super::host::WinitHost;
use crate::config::RendererConfig;
use crate::core::{run_frame, App, AppControl, Command, Commands};
use crate::device::wgpu::{GpuInit, WgpuBackend};
use crate::render::{FrameOutcome, Renderer};
use crate::time::{FrameClock, FramePacer};

/// Window configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    pub resizable: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "canto".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
            resizable: true,
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens one window, initializes the renderer on it and drives frames
    /// until the app exits or the window is closed.
    ///
    /// Device creation failure is returned as an error.
    pub fn run<A>(
        config: RuntimeConfig,
        gpu_init: GpuInit,
        renderer_config: RendererConfig,
        app: A,
    ) -> Result<()>
    where
        A: 'static + App,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, gpu_init, renderer_config, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[self_referencing]
struct WindowEntry {
    clock: FrameClock,
    pacer: FramePacer,

    window: Window,

    #[borrows(window)]
    #[covariant]
    renderer: Renderer<WgpuBackend<'this>>,
}

struct AppState<A>
where
    A: App + 'static,
{
    config: RuntimeConfig,
    gpu_init: GpuInit,
    renderer_config: RendererConfig,
    app: A,

    entry: Option<WindowEntry>,
    commands: Commands,
    exit_requested: bool,
    error: Option<anyhow::Error>,
}

impl<A> AppState<A>
where
    A: App + 'static,
{
    fn new(
        config: RuntimeConfig,
        gpu_init: GpuInit,
        renderer_config: RendererConfig,
        app: A,
    ) -> Self {
        Self {
            config,
            gpu_init,
            renderer_config,
            app,
            entry: None,
            commands: Commands::default(),
            exit_requested: false,
            error: None,
        }
    }

    fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    fn create_window_entry(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size)
            .with_resizable(self.config.resizable);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let gpu_init = self.gpu_init.clone();
        let renderer_config = self.renderer_config.clone();
        let pacer = FramePacer::new(renderer_config.vsync, renderer_config.max_fps);

        let mut entry = WindowEntryTryBuilder {
            clock: FrameClock::new(),
            pacer,
            window,
            renderer_builder: |w| open_renderer(w, gpu_init, renderer_config),
        }
        .try_build()?;

        let app = &mut self.app;
        entry
            .with_renderer_mut(|renderer| app.on_init(renderer))
            .context("application initialization failed")?;

        entry.with_window(|w| w.request_redraw());
        self.entry = Some(entry);
        Ok(())
    }

    /// Calls `on_exit`, unloads the renderer and drops the window.
    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(mut entry) = self.entry.take() {
            let app = &mut self.app;
            entry.with_renderer_mut(|renderer| {
                app.on_exit(renderer);
                renderer.unload();
            });
        }
        event_loop.exit();
    }

    fn apply_commands(&mut self) {
        let mut deferred = Vec::new();
        for cmd in self.commands.drain() {
            match cmd {
                Command::Exit => self.request_exit(),
                Command::SetFullscreen(on) => {
                    if let Some(entry) = self.entry.as_mut() {
                        entry.with_renderer_mut(|r| r.set_fullscreen(on));
                    }
                }
                Command::ToggleFullscreen => {
                    if let Some(entry) = self.entry.as_mut() {
                        entry.with_renderer_mut(|r| r.toggle_fullscreen());
                    }
                }
                // Served by the next frame's update phase.
                Command::Screenshot(dir) => deferred.push(dir),
            }
        }
        for dir in deferred {
            self.commands.screenshot(dir);
        }
    }

    fn redraw(&mut self) {
        let (app, commands) = (&mut self.app, &mut self.commands);
        let Some(entry) = self.entry.as_mut() else { return };

        let (outcome, reason) = entry.with_mut(|fields| {
            let now = Instant::now();
            fields.pacer.begin_frame(now);
            let time = fields.clock.tick_at(now);

            let mut host = WinitHost::new(fields.window);
            let outcome = run_frame(app, fields.renderer, &mut host, time, commands);
            if outcome == FrameOutcome::Recovered {
                fields.clock.reset();
            }
            let reason = fields.renderer.fatal_error().map(|e| e.to_string());
            (outcome, reason)
        });

        if outcome == FrameOutcome::Fatal {
            let reason = reason.unwrap_or_else(|| "rendering device unusable".to_string());
            log::error!("{reason}, exiting");
            self.error = Some(anyhow::anyhow!(reason));
            self.request_exit();
        }
    }
}

/// Creates the wgpu backend on `window` and initializes the renderer for the
/// window's client area.
fn open_renderer<'w>(
    window: &'w Window,
    gpu_init: GpuInit,
    config: RendererConfig,
) -> Result<Renderer<WgpuBackend<'w>>> {
    let start_fullscreen = config.fullscreen;
    let backend = WgpuBackend::new(window, gpu_init).context("failed to create wgpu surface")?;

    let mut renderer = Renderer::new(backend, config);
    let size = window.inner_size();
    renderer
        .init((size.width, size.height))
        .context("failed to initialize rendering device")?;

    if start_fullscreen {
        renderer.apply_fullscreen(&mut WinitHost::new(window), true);
    }
    Ok(renderer)
}

impl<A> ApplicationHandler for AppState<A>
where
    A: App + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() {
            return;
        }

        if let Err(e) = self.create_window_entry(event_loop) {
            log::error!("failed to start: {e:#}");
            self.error = Some(e);
            self.request_exit();
            self.shutdown(event_loop);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            self.shutdown(event_loop);
            return;
        }
        let Some(entry) = self.entry.as_ref() else { return };

        // Vsync paces through present; otherwise sleep until the cycle ends.
        let now = Instant::now();
        match entry.with_pacer(|p| p.next_deadline()) {
            Some(deadline) if deadline > now => {
                event_loop.set_control_flow(ControlFlow::WaitUntil(deadline));
            }
            _ => {
                event_loop.set_control_flow(ControlFlow::Wait);
                entry.with_window(|w| w.request_redraw());
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.exit_requested {
            self.shutdown(event_loop);
            return;
        }

        if self.app.on_window_event(&event, &mut self.commands) == AppControl::Exit {
            self.request_exit();
        }

        match &event {
            WindowEvent::CloseRequested => self.request_exit(),

            WindowEvent::Resized(new_size) => {
                if let Some(entry) = self.entry.as_mut() {
                    entry.with_renderer_mut(|r| r.resize(new_size.width, new_size.height));
                    entry.with_window(|w| w.request_redraw());
                }
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(entry) = self.entry.as_mut() {
                    let size = entry.with_window(|w| w.inner_size());
                    entry.with_renderer_mut(|r| r.resize(size.width, size.height));
                }
            }

            WindowEvent::RedrawRequested => self.redraw(),

            _ => {}
        }

        self.apply_commands();

        if self.exit_requested {
            self.shutdown(event_loop);
        }
    }
}
