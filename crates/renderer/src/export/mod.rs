//! Background exports that coexist with the interactive loop.
//!
//! At most one job runs at a time. Screenshots and gif sweeps run on a worker
//! thread; fly-through videos are advanced one frame per [`tick`] on the
//! caller's thread. While any job is active the interactive scheduler must
//! stay idle, which callers check through [`AsyncExportCoordinator::is_busy`].
//!
//! [`tick`]: AsyncExportCoordinator::tick

mod files;
mod gif;
mod video;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use serde::{Deserialize, Serialize};

use crate::backend::ComputeBackend;
use crate::camera::CameraState;
use crate::capture::{capture_width, CapturePasses, OffscreenCaptureEngine};
use crate::error::RenderError;
use crate::keyframes::{path_frame_count, sample_path};
use crate::status::{notify, StatusEvent};

pub use files::{unique_dir_in, unique_file_in};
pub use gif::{encode_gif, swish_cameras};
pub use video::{default_encoder, FfmpegEncoder, PngSequenceEncoder, VideoEncoder, VideoSegment};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenshotSettings {
    pub height: u32,
    pub warmup_passes: u32,
    pub passes_per_frame: u32,
    pub accumulation: u32,
}

impl Default for ScreenshotSettings {
    fn default() -> Self {
        Self {
            height: 2048,
            warmup_passes: 16,
            passes_per_frame: 16,
            accumulation: 75,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GifSettings {
    pub height: u32,
    pub frames: u32,
    pub warmup_passes: u32,
    pub passes_per_frame: u32,
    pub accumulation: u32,
    /// Sweep amplitude is `move_speed / amplitude_divisor`.
    pub amplitude_divisor: f64,
    pub frame_delay_ms: u32,
}

impl Default for GifSettings {
    fn default() -> Self {
        Self {
            height: 480,
            frames: 10,
            warmup_passes: 1,
            passes_per_frame: 1,
            accumulation: 10,
            amplitude_divisor: 32.0,
            frame_delay_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub height: u32,
    pub warmup_passes: u32,
    pub passes_per_frame: u32,
    pub steps_per_point: u32,
    pub fps: u32,
    /// A new container is opened every this many frames.
    pub frames_per_segment: u32,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            height: 720,
            warmup_passes: 1,
            passes_per_frame: 1,
            steps_per_point: 60,
            fps: 25,
            frames_per_segment: 256,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub screenshot: ScreenshotSettings,
    pub gif: GifSettings,
    pub video: VideoSettings,
}

/// A self-contained export request; cameras are copies, never live state.
#[derive(Debug, Clone)]
pub enum ExportJob {
    Screenshot {
        camera: CameraState,
        settings: ScreenshotSettings,
    },
    GifSweep {
        camera: CameraState,
        settings: GifSettings,
    },
    Video {
        keyframes: Vec<CameraState>,
        settings: VideoSettings,
    },
}

impl ExportJob {
    pub fn kind(&self) -> ExportKind {
        match self {
            ExportJob::Screenshot { .. } => ExportKind::Screenshot,
            ExportJob::GifSweep { .. } => ExportKind::GifSweep,
            ExportJob::Video { .. } => ExportKind::Video,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Screenshot,
    GifSweep,
    Video,
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportKind::Screenshot => f.write_str("screenshot"),
            ExportKind::GifSweep => f.write_str("gif sweep"),
            ExportKind::Video => f.write_str("video"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExportState {
    Interactive = 0,
    ExportPending = 1,
    ExportRunning = 2,
}

impl ExportState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ExportState::ExportPending,
            2 => ExportState::ExportRunning,
            _ => ExportState::Interactive,
        }
    }
}

type ExportResult = Result<Vec<PathBuf>, RenderError>;

/// Completion of one accepted export, resolving to the written artifacts.
pub struct ExportHandle {
    kind: ExportKind,
    rx: Receiver<ExportResult>,
}

impl ExportHandle {
    fn resolved(kind: ExportKind, result: ExportResult) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let _ = tx.send(result);
        Self { kind, rx }
    }

    pub fn kind(&self) -> ExportKind {
        self.kind
    }

    /// `None` while the job is still running.
    pub fn try_result(&self) -> Option<ExportResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(RenderError::WorkerDisconnected)),
        }
    }

    /// Blocks until the job reports. Video jobs only report once the caller
    /// has ticked them to completion.
    pub fn wait(self) -> ExportResult {
        self.rx.recv().unwrap_or(Err(RenderError::WorkerDisconnected))
    }
}

struct VideoJob {
    keyframes: Vec<CameraState>,
    settings: VideoSettings,
    frame: u32,
    total: u32,
    segment: Option<Box<dyn VideoSegment>>,
    written: Vec<PathBuf>,
    done: Sender<ExportResult>,
}

/// Arbitrates the device between the interactive loop and export jobs.
pub struct AsyncExportCoordinator<C: ComputeBackend> {
    engine: Arc<OffscreenCaptureEngine<C>>,
    output_dir: PathBuf,
    state: Arc<AtomicU8>,
    video: Option<VideoJob>,
    encoder: Box<dyn VideoEncoder>,
    status: Option<Sender<StatusEvent>>,
}

impl<C: ComputeBackend> AsyncExportCoordinator<C> {
    pub fn new(
        engine: Arc<OffscreenCaptureEngine<C>>,
        output_dir: impl Into<PathBuf>,
        encoder: Box<dyn VideoEncoder>,
    ) -> Self {
        Self {
            engine,
            output_dir: output_dir.into(),
            state: Arc::new(AtomicU8::new(ExportState::Interactive as u8)),
            video: None,
            encoder,
            status: None,
        }
    }

    pub fn with_status(mut self, status: Sender<StatusEvent>) -> Self {
        self.status = Some(status);
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn state(&self) -> ExportState {
        ExportState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_busy(&self) -> bool {
        self.state() != ExportState::Interactive
    }

    /// Starts `job` unless another export is active.
    ///
    /// Returns `None` when the request was dropped because the device is
    /// already owned by a job; nothing about that job changes.
    pub fn request(&mut self, job: ExportJob) -> Option<ExportHandle> {
        let kind = job.kind();
        if let ExportJob::Video { keyframes, .. } = &job {
            if keyframes.len() < 2 && !self.is_busy() {
                let err = RenderError::NotEnoughKeyframes(keyframes.len());
                notify(
                    self.status.as_ref(),
                    StatusEvent::ExportFailed {
                        kind,
                        message: err.to_string(),
                    },
                );
                return Some(ExportHandle::resolved(kind, Err(err)));
            }
        }

        let initial = match kind {
            ExportKind::Video => ExportState::ExportRunning,
            _ => ExportState::ExportPending,
        };
        if self
            .state
            .compare_exchange(
                ExportState::Interactive as u8,
                initial as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            tracing::debug!(%kind, state = ?self.state(), "export already in progress; request ignored");
            return None;
        }

        notify(self.status.as_ref(), StatusEvent::ExportStarted(kind));
        let (tx, rx) = crossbeam_channel::bounded(1);
        match job {
            ExportJob::Video {
                keyframes,
                settings,
            } => {
                let total = path_frame_count(keyframes.len(), settings.steps_per_point.max(1));
                tracing::info!(keyframes = keyframes.len(), frames = total, "starting fly-through");
                self.video = Some(VideoJob {
                    keyframes,
                    settings,
                    frame: 0,
                    total,
                    segment: None,
                    written: Vec::new(),
                    done: tx,
                });
            }
            ExportJob::Screenshot { camera, settings } => {
                self.spawn_worker(WorkerJob::Screenshot { camera, settings }, tx)
            }
            ExportJob::GifSweep { camera, settings } => {
                self.spawn_worker(WorkerJob::GifSweep { camera, settings }, tx)
            }
        }
        Some(ExportHandle { kind, rx })
    }

    fn spawn_worker(&self, job: WorkerJob, tx: Sender<ExportResult>) {
        let kind = job.kind();
        let engine = Arc::clone(&self.engine);
        let state = Arc::clone(&self.state);
        let output_dir = self.output_dir.clone();
        let status = self.status.clone();

        let spawned = thread::Builder::new()
            .name(format!("export-{}", kind).replace(' ', "-"))
            .spawn(move || {
                let running = RunningGuard::enter(state);
                let result = run_job(&engine, job, &output_dir, status.as_ref());
                report(status.as_ref(), kind, &result);
                drop(running);
                let _ = tx.send(result);
            });
        if let Err(err) = spawned {
            tracing::error!(%kind, "failed to start export worker: {err}");
            self.state
                .store(ExportState::Interactive as u8, Ordering::Release);
        }
    }

    /// Advances an active video by one output frame and returns the state
    /// after the step. Without a video this only reports the current state.
    pub fn tick(&mut self) -> ExportState {
        let Some(mut job) = self.video.take() else {
            return self.state();
        };

        match self.advance_video(&mut job) {
            Ok(true) => self.video = Some(job),
            Ok(false) => {
                let result = Ok(std::mem::take(&mut job.written));
                self.finish_video(job, result);
            }
            Err(err) => {
                if let Some(segment) = job.segment.take() {
                    let path = segment.path().to_path_buf();
                    if let Err(close_err) = segment.close() {
                        tracing::warn!(path = %path.display(), "failed to close video segment: {close_err}");
                    }
                }
                self.finish_video(job, Err(err));
            }
        }
        self.state()
    }

    /// Renders and appends one frame. Returns `false` once the path is done.
    fn advance_video(&self, job: &mut VideoJob) -> Result<bool, RenderError> {
        let settings = &job.settings;
        let Some(camera) = sample_path(&job.keyframes, job.frame, settings.steps_per_point) else {
            if let Some(segment) = job.segment.take() {
                job.written.push(self.close_segment(segment)?);
            }
            return Ok(false);
        };

        let height = settings.height;
        let width = capture_width(height);
        if job.frame % settings.frames_per_segment.max(1) == 0 {
            if let Some(segment) = job.segment.take() {
                job.written.push(self.close_segment(segment)?);
            }
            job.segment = Some(
                self.encoder
                    .open(&self.output_dir, width, height, settings.fps)?,
            );
        }

        let passes = CapturePasses::for_camera(
            &camera,
            settings.warmup_passes,
            settings.passes_per_frame,
            None,
        );
        let image = self.engine.capture(&camera, width, height, passes)?;
        if let Some(segment) = job.segment.as_mut() {
            segment.write_frame(&image)?;
        }

        job.frame += 1;
        notify(
            self.status.as_ref(),
            StatusEvent::ExportProgress {
                kind: ExportKind::Video,
                done: job.frame,
                total: job.total,
            },
        );
        Ok(true)
    }

    fn close_segment(&self, segment: Box<dyn VideoSegment>) -> Result<PathBuf, RenderError> {
        let path = segment.close()?;
        tracing::info!(path = %path.display(), "saved video segment");
        notify(self.status.as_ref(), StatusEvent::Saved(path.clone()));
        Ok(path)
    }

    fn finish_video(&mut self, job: VideoJob, result: ExportResult) {
        report(self.status.as_ref(), ExportKind::Video, &result);
        self.state
            .store(ExportState::Interactive as u8, Ordering::Release);
        let _ = job.done.send(result);
    }
}

/// Exports that run to completion on a worker thread.
enum WorkerJob {
    Screenshot {
        camera: CameraState,
        settings: ScreenshotSettings,
    },
    GifSweep {
        camera: CameraState,
        settings: GifSettings,
    },
}

impl WorkerJob {
    fn kind(&self) -> ExportKind {
        match self {
            WorkerJob::Screenshot { .. } => ExportKind::Screenshot,
            WorkerJob::GifSweep { .. } => ExportKind::GifSweep,
        }
    }
}

/// Marks the coordinator running for as long as a worker holds it, and hands
/// the device back on drop, including when the worker unwinds.
struct RunningGuard {
    state: Arc<AtomicU8>,
}

impl RunningGuard {
    fn enter(state: Arc<AtomicU8>) -> Self {
        state.store(ExportState::ExportRunning as u8, Ordering::Release);
        Self { state }
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.state
            .store(ExportState::Interactive as u8, Ordering::Release);
    }
}

fn run_job<C: ComputeBackend>(
    engine: &OffscreenCaptureEngine<C>,
    job: WorkerJob,
    output_dir: &Path,
    status: Option<&Sender<StatusEvent>>,
) -> ExportResult {
    std::fs::create_dir_all(output_dir)?;
    match job {
        WorkerJob::Screenshot { camera, settings } => {
            let height = settings.height;
            let passes = CapturePasses::for_camera(
                &camera,
                settings.warmup_passes,
                settings.passes_per_frame,
                Some(settings.accumulation),
            );
            let image = engine.capture(&camera, capture_width(height), height, passes)?;
            let path = unique_file_in(output_dir, "screenshot", "png");
            image.save(&path)?;
            tracing::info!(path = %path.display(), "saved screenshot");
            notify(status, StatusEvent::Saved(path.clone()));
            Ok(vec![path])
        }
        WorkerJob::GifSweep { camera, settings } => {
            let path = gif::render_gif_sweep(engine, &camera, &settings, output_dir, status)?;
            tracing::info!(path = %path.display(), "saved gif sweep");
            notify(status, StatusEvent::Saved(path.clone()));
            Ok(vec![path])
        }
    }
}

fn report(status: Option<&Sender<StatusEvent>>, kind: ExportKind, result: &ExportResult) {
    match result {
        Ok(_) => notify(status, StatusEvent::ExportFinished(kind)),
        Err(err) => {
            tracing::error!(%kind, "export failed: {err}");
            notify(
                status,
                StatusEvent::ExportFailed {
                    kind,
                    message: err.to_string(),
                },
            );
        }
    }
}
