use std::sync::mpsc::{self, Receiver};
use std::thread;

use anyhow::Result;
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use canto_engine::core::{App, AppControl, Commands, FrameCtx};
use canto_engine::coords::{ColorRgba, DrawRect, Rect};
use canto_engine::device::wgpu::GpuInit;
use canto_engine::device::GpuBackend;
use canto_engine::logging::{init_logging, LoggingConfig};
use canto_engine::render::Renderer;
use canto_engine::text::{FontId, FontSystem};
use canto_engine::texture::TextureStore;
use canto_engine::window::{Runtime, RuntimeConfig};
use canto_engine::{DrawParams, RendererConfig, TextureHandle};

const SCREENSHOT_DIR: &str = "screenshots";
const CHECKER_SIZE: u32 = 64;
const SONG_LENGTH: f32 = 12.0;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let config = RuntimeConfig { title: "Canto Studio".to_string(), ..Default::default() };
    Runtime::run(config, GpuInit::default(), RendererConfig::default(), Studio::new())
}

struct Studio {
    fonts: FontSystem,
    font: Option<FontId>,
    checker: TextureHandle,
    /// Covers generated on a worker thread and queued for upload.
    covers: Vec<TextureHandle>,
    incoming: Option<Receiver<TextureHandle>>,
    angle: f32,
    song_pos: f32,
}

impl Studio {
    fn new() -> Self {
        let mut fonts = FontSystem::new();
        let font = load_font(&mut fonts);
        Self {
            fonts,
            font,
            checker: TextureHandle::INVALID,
            covers: Vec::new(),
            incoming: None,
            angle: 0.0,
            song_pos: 0.0,
        }
    }

    fn collect_covers(&mut self) {
        let Some(rx) = &self.incoming else { return };
        self.covers.extend(rx.try_iter());
    }
}

impl App for Studio {
    fn on_init<B: GpuBackend>(&mut self, renderer: &mut Renderer<B>) -> Result<()> {
        let (light, dark) = ([0xF0, 0xF0, 0xF0, 0xFF], [0x40, 0x30, 0x30, 0xFF]);
        let pixels = checkerboard(CHECKER_SIZE, 8, light, dark);
        self.checker = renderer.create_texture(CHECKER_SIZE, CHECKER_SIZE, &pixels)?;
        self.incoming = Some(spawn_cover_loader(renderer.texture_store()));
        log::info!("studio ready, {} texture(s) loaded", renderer.texture_count());
        Ok(())
    }

    fn on_window_event(&mut self, event: &WindowEvent, commands: &mut Commands) -> AppControl {
        let WindowEvent::KeyboardInput { event, .. } = event else {
            return AppControl::Continue;
        };
        if event.state != ElementState::Pressed || event.repeat {
            return AppControl::Continue;
        }

        match event.physical_key {
            PhysicalKey::Code(KeyCode::Escape) => return AppControl::Exit,
            PhysicalKey::Code(KeyCode::F11) => commands.toggle_fullscreen(),
            PhysicalKey::Code(KeyCode::F12) => commands.screenshot(SCREENSHOT_DIR),
            _ => {}
        }
        AppControl::Continue
    }

    fn on_draw<B: GpuBackend>(&mut self, ctx: &mut FrameCtx<'_, B>) {
        let r = &mut *ctx.renderer;
        let (w, h) = (r.screen_width() as f32, r.screen_height() as f32);

        r.draw_color(ColorRgba::from_u8(0x18, 0x14, 0x24, 0xFF), Rect::new(0.0, 0.0, w, h));

        // Spinning checker with its reflection.
        let spin = DrawRect::new(80.0, 120.0, 192.0, 192.0).rotated(self.angle);
        r.draw_texture_in(self.checker, spin);
        r.draw_texture_reflection(
            self.checker,
            DrawRect::new(80.0, 120.0, 192.0, 192.0),
            ColorRgba::white().with_alpha(0.5),
            Rect::new(0.0, 0.0, w, h),
            8.0,
            96.0,
        );

        // Clipped strip of covers.
        let strip = Rect::new(340.0, 120.0, w - 420.0, 160.0);
        r.draw_color(ColorRgba::new(0.0, 0.0, 0.0, 0.35), strip);
        let offset = (self.song_pos * 60.0) % 180.0;
        for (i, cover) in self.covers.iter().enumerate() {
            let x = strip.x - offset + i as f32 * 180.0;
            let params = DrawParams::new(Rect::new(x, strip.y, 160.0, 160.0)).bounds(strip);
            r.draw_texture_with(*cover, params);
        }

        // Song progress bar.
        let bar = Rect::new(80.0, h - 80.0, w - 160.0, 24.0);
        r.draw_color(ColorRgba::new(0.2, 0.2, 0.25, 1.0), bar);
        let progress = (self.song_pos / SONG_LENGTH).clamp(0.0, 1.0);
        let fill = ColorRgba::new(1.0, 0.6, 0.2, 1.0);
        r.draw_texture_section(self.checker, bar, fill, 0.0, progress);
        r.draw_line(ColorRgba::white(), 2.0, bar.x, bar.y - 6.0, bar.right(), bar.y - 6.0);

        if let Some(font) = self.font {
            let title = "Canto Studio";
            r.draw_text(&self.fonts, font, title, 80.0, 40.0, 40.0, ColorRgba::white());

            let status =
                format!("{:5.1} fps  F11 fullscreen  F12 screenshot  Esc quit", ctx.time.fps);
            let bounds = r.text_bounds(&self.fonts, font, &status, 80.0, 0.0, 18.0);
            let dim = ColorRgba::new(0.8, 0.8, 0.9, 1.0);
            r.draw_text(&self.fonts, font, &status, 80.0, h - bounds.h - 16.0, 18.0, dim);
        }
    }

    fn on_update<B: GpuBackend>(&mut self, ctx: &mut FrameCtx<'_, B>) -> AppControl {
        self.collect_covers();
        self.angle = (self.angle + 45.0 * ctx.time.dt) % 360.0;
        self.song_pos = (self.song_pos + ctx.time.dt) % SONG_LENGTH;
        AppControl::Continue
    }

    fn on_exit<B: GpuBackend>(&mut self, renderer: &mut Renderer<B>) {
        for cover in self.covers.drain(..) {
            renderer.release_texture(cover);
        }
        renderer.release_texture(self.checker);
    }
}

/// Generates a few gradient covers off the render thread and queues them;
/// handles arrive on the returned channel as they are queued.
fn spawn_cover_loader(store: TextureStore) -> Receiver<TextureHandle> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for hue in 0..8u32 {
            let pixels = gradient(128, hue);
            match store.queue_upload(128, 128, &pixels) {
                Ok(handle) => {
                    if tx.send(handle).is_err() {
                        store.release(handle);
                        return;
                    }
                }
                Err(e) => {
                    log::warn!("cover {hue} not queued: {e}");
                    return;
                }
            }
        }
    });
    rx
}

/// BGRA8 checkerboard with `cell`-pixel squares.
fn checkerboard(size: u32, cell: u32, a: [u8; 4], b: [u8; 4]) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let even = ((x / cell) + (y / cell)) % 2 == 0;
            pixels.extend_from_slice(if even { &a } else { &b });
        }
    }
    pixels
}

/// BGRA8 diagonal gradient tinted by `hue`.
fn gradient(size: u32, hue: u32) -> Vec<u8> {
    let tint = [(hue * 37 % 256) as u8, (hue * 91 % 256) as u8, (hue * 53 % 256) as u8];
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let t = ((x + y) * 255 / (2 * size - 2)) as u16;
            for c in tint {
                pixels.push(((c as u16 * t) / 255) as u8);
            }
            pixels.push(0xFF);
        }
    }
    pixels
}

fn load_font(fonts: &mut FontSystem) -> Option<FontId> {
    let path = [
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/noto/NotoSans-Regular.ttf",
        "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    ]
    .iter()
    .map(std::path::Path::new)
    .find(|p| p.exists());

    let Some(path) = path else {
        log::warn!("no system font found, text disabled");
        return None;
    };
    match fonts.load_font_file(path) {
        Ok(id) => Some(id),
        Err(e) => {
            log::warn!("font {} unusable: {e}", path.display());
            None
        }
    }
}
