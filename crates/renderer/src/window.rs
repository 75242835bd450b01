use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::Receiver;
use tracing::{error, info};
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Window, WindowBuilder};

use crate::app::{App, CommandOutcome};
use crate::error::RenderError;
use crate::export::default_encoder;
use crate::gpu::WgpuDisplay;
use crate::input::KeyboardState;
use crate::status::{status_channel, StatusEvent};
use crate::types::RendererConfig;

const STATUS_LIFETIME: Duration = Duration::from_secs(10);
const FPS_WINDOW: Duration = Duration::from_secs(1);
const TITLE: &str = "scatterlight";

/// Aggregates the app and the window it draws into.
///
/// `app` is declared first so the surface it owns is dropped before the window.
struct WindowState {
    app: App<WgpuDisplay>,
    window: Arc<Window>,
    keyboard: KeyboardState,
    title: TitleState,
    status: Receiver<StatusEvent>,
    last_tick: Instant,
}

impl WindowState {
    fn new(window: Arc<Window>, config: &RendererConfig) -> Result<Self> {
        let size = window.inner_size();
        let display = WgpuDisplay::new(window.as_ref(), size, config.gpu_power)?;
        let compute = Arc::new(display.compute());
        let (status_tx, status_rx) = status_channel();
        let mut app = App::new(display, compute, config, default_encoder(), Some(status_tx))
            .context("failed to initialise renderer")?;
        app.resize(size.width, size.height)?;

        Ok(Self {
            app,
            window,
            keyboard: KeyboardState::default(),
            title: TitleState::new(&config.kernel_label, Instant::now()),
            status: status_rx,
            last_tick: Instant::now(),
        })
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        if let Err(err) = self.app.resize(size.width, size.height) {
            error!("failed to resize shared buffer: {err}");
        }
    }

    fn redraw(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_tick).as_secs_f64();
        self.last_tick = now;

        match self.app.tick(self.keyboard.motions(), dt) {
            Ok(_) => {}
            Err(RenderError::SurfaceLost) => {
                let size = self.app.display().size();
                self.resize(size);
            }
            Err(err) => error!("frame failed: {err}"),
        }

        for event in self.status.try_iter() {
            self.title.set_status(event.to_string(), now);
        }
        if let Some(title) = self.title.frame(now) {
            self.window.set_title(&title);
        }
    }
}

/// Frame-rate counter plus the latest status line, rendered into the title.
struct TitleState {
    prefix: String,
    frames: u32,
    window_start: Instant,
    fps: f64,
    status: Option<(String, Instant)>,
}

impl TitleState {
    fn new(kernel_label: &str, now: Instant) -> Self {
        Self {
            prefix: window_title(kernel_label),
            frames: 0,
            window_start: now,
            fps: 0.0,
            status: None,
        }
    }

    fn set_status(&mut self, message: String, now: Instant) {
        self.status = Some((message, now));
    }

    /// Counts one frame; returns a new title once per second.
    fn frame(&mut self, now: Instant) -> Option<String> {
        self.frames += 1;
        let elapsed = now.duration_since(self.window_start);
        if elapsed < FPS_WINDOW {
            return None;
        }
        self.fps = f64::from(self.frames) / elapsed.as_secs_f64();
        self.frames = 0;
        self.window_start = now;
        Some(self.title(now))
    }

    fn title(&mut self, now: Instant) -> String {
        if let Some((_, at)) = &self.status {
            if now.duration_since(*at) >= STATUS_LIFETIME {
                self.status = None;
            }
        }
        match &self.status {
            Some((message, _)) => format!("{} | {:.1} fps | {message}", self.prefix, self.fps),
            None => format!("{} | {:.1} fps", self.prefix, self.fps),
        }
    }
}

fn window_title(kernel_label: &str) -> String {
    format!("{TITLE} - {kernel_label}")
}

/// Opens the interactive window and runs until it is closed or Escape is hit.
pub fn run_window(config: RendererConfig) -> Result<()> {
    let event_loop =
        EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let window_size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
    let window = WindowBuilder::new()
        .with_title(window_title(&config.kernel_label))
        .with_inner_size(window_size)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window = Arc::new(window);

    let mut state = WindowState::new(Arc::clone(&window), &config)?;
    info!(kernel = %config.kernel_label, "interactive renderer ready");

    let run_result = event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);
        match event {
            Event::WindowEvent { window_id, event } if window_id == state.window.id() => {
                match event {
                    WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
                    WindowEvent::KeyboardInput { event, .. } => {
                        if let Some(command) = state.keyboard.handle_event(&event) {
                            if state.app.handle_command(command) == CommandOutcome::Quit {
                                elwt.exit();
                            }
                        }
                    }
                    WindowEvent::Focused(false) => state.keyboard.clear(),
                    WindowEvent::Resized(new_size) => state.resize(new_size),
                    WindowEvent::RedrawRequested => state.redraw(),
                    _ => {}
                }
            }
            Event::AboutToWait => state.window.request_redraw(),
            _ => {}
        }
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}
