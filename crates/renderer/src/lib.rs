//! Renderer crate for scatterlight, a progressive GPU-compute renderer.
//!
//! One pixel buffer is shared between the window surface and a set of WGSL
//! compute kernels. Every interactive tick adds one accumulation pass to it;
//! exports render privately at higher resolution without touching it.
//!
//! ```text
//!   CLI / scatterlight
//!          │ RendererConfig
//!          ▼
//!   run_window ──▶ App::tick ──▶ AsyncExportCoordinator::tick (video frame)
//!                       │
//!                       └─▶ ProgressiveRenderScheduler::tick
//!                                 │
//!                                 └─▶ SharedBufferInterop::draw ─▶ present
//!
//!   exports ──▶ OffscreenCaptureEngine::capture ─▶ png / gif / video
//! ```
//!
//! The compute and display domains sit behind [`ComputeBackend`] and
//! [`DisplayBackend`]; [`gpu`] implements both on wgpu.

mod app;
mod backend;
mod camera;
mod capture;
mod compile;
mod error;
mod export;
pub mod gpu;
mod headless;
mod input;
mod interop;
mod kernel;
mod keyframes;
mod launch;
mod persist;
mod progressive;
mod status;
mod types;
mod window;

#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

pub use app::{App, CommandOutcome, TickOutcome};
pub use backend::{buffer_bytes, ComputeBackend, DisplayBackend, BYTES_PER_PIXEL};
pub use camera::{CameraMotion, CameraState};
pub use capture::{capture_width, to_rgb_image, CapturePasses, OffscreenCaptureEngine};
pub use compile::{wrap_kernel_source, DEFAULT_KERNEL};
pub use error::RenderError;
pub use export::{
    default_encoder, AsyncExportCoordinator, ExportHandle, ExportJob, ExportKind, ExportSettings,
    ExportState, FfmpegEncoder, GifSettings, PngSequenceEncoder, ScreenshotSettings, VideoEncoder,
    VideoSegment, VideoSettings,
};
pub use headless::{run_headless, HeadlessExport};
pub use input::{AppCommand, KeyboardState};
pub use interop::SharedBufferInterop;
pub use kernel::{KernelArgs, KernelProgram};
pub use keyframes::{
    catmull_rom, path_frame_count, sample_path, KeyframeTrack, KEYFRAME_ACCUMULATION,
};
pub use launch::{global_size, LaunchConfig, LaunchPlanner, LocalSize};
pub use persist::{load_camera, load_keyframes, save_camera, save_keyframes, CameraRecord};
pub use progressive::{FrameCounters, ProgressiveRenderScheduler, SchedulerState};
pub use status::{status_channel, StatusEvent};
pub use types::{GpuPowerPreference, RendererConfig};

/// High-level entry point that owns the chosen configuration.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Opens the interactive window and drives the `winit` event loop until
    /// the window closes.
    pub fn run(&self) -> Result<()> {
        window::run_window(self.config.clone())
    }

    /// Runs one export on a surfaceless device and returns what it wrote.
    pub fn run_headless(&self, export: HeadlessExport) -> Result<Vec<PathBuf>> {
        let compute = gpu::headless_compute(self.config.gpu_power)?;
        let encoder: Box<dyn VideoEncoder> = match export {
            HeadlessExport::Screenshot => Box::new(PngSequenceEncoder),
            HeadlessExport::Video => default_encoder(),
        };
        run_headless(Arc::new(compute), &self.config, export, encoder)
            .with_context(|| format!("headless {export:?} export failed"))
    }
}
