//! Per-tick glue between input, the interactive scheduler and exports.

use std::path::PathBuf;
use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::backend::{ComputeBackend, DisplayBackend};
use crate::camera::{CameraMotion, CameraState};
use crate::capture::OffscreenCaptureEngine;
use crate::error::RenderError;
use crate::export::{AsyncExportCoordinator, ExportHandle, ExportJob, ExportSettings, VideoEncoder};
use crate::input::AppCommand;
use crate::interop::SharedBufferInterop;
use crate::kernel::KernelProgram;
use crate::keyframes::KeyframeTrack;
use crate::launch::LaunchPlanner;
use crate::persist;
use crate::progressive::{FrameCounters, ProgressiveRenderScheduler};
use crate::status::{notify, StatusEvent};
use crate::types::RendererConfig;

/// What one interactive tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Presented(FrameCounters),
    /// Drawing was skipped: an export owns the device or nothing is allocated.
    Skipped,
}

/// Outcome of a key command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Continue,
    Quit,
}

pub struct App<D: DisplayBackend> {
    camera: CameraState,
    keyframes: KeyframeTrack,
    interop: SharedBufferInterop<D>,
    scheduler: ProgressiveRenderScheduler<D::Compute>,
    exports: AsyncExportCoordinator<D::Compute>,
    export_settings: ExportSettings,
    state_file: PathBuf,
    keyframe_file: PathBuf,
    status: Option<Sender<StatusEvent>>,
}

impl<D: DisplayBackend> App<D> {
    /// Builds the kernel program once and wires it into both render paths.
    ///
    /// A kernel that fails to build is logged and leaves the window running
    /// with every dispatch and capture disabled.
    pub fn new(
        display: D,
        compute: Arc<D::Compute>,
        config: &RendererConfig,
        encoder: Box<dyn VideoEncoder>,
        status: Option<Sender<StatusEvent>>,
    ) -> Result<Self, RenderError> {
        let planner = LaunchPlanner::new(compute.max_work_group_size());
        let program = Arc::new(KernelProgram::build(
            compute.as_ref(),
            &config.kernel_source,
            planner.local(),
        ));
        let engine = Arc::new(OffscreenCaptureEngine::new(
            Arc::clone(&compute),
            Arc::clone(&program),
            planner,
        ));
        let mut exports = AsyncExportCoordinator::new(engine, &config.output_dir, encoder);
        if let Some(tx) = &status {
            exports = exports.with_status(tx.clone());
        }

        let camera = match persist::load_camera(&config.state_file) {
            Ok(camera) => camera.unwrap_or_default(),
            Err(err) => {
                tracing::warn!("ignoring saved camera: {err}");
                CameraState::default()
            }
        };
        let keyframes = match persist::load_keyframes(&config.keyframe_file) {
            Ok(frames) => KeyframeTrack::new(frames),
            Err(err) => {
                tracing::warn!("ignoring saved keyframes: {err}");
                KeyframeTrack::default()
            }
        };

        Ok(Self {
            camera,
            keyframes,
            interop: SharedBufferInterop::new(display, compute)?,
            scheduler: ProgressiveRenderScheduler::new(program, planner),
            exports,
            export_settings: config.export.clone(),
            state_file: config.state_file.clone(),
            keyframe_file: config.keyframe_file.clone(),
            status,
        })
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn keyframes(&self) -> &KeyframeTrack {
        &self.keyframes
    }

    pub fn exports(&self) -> &AsyncExportCoordinator<D::Compute> {
        &self.exports
    }

    pub fn display(&self) -> &D {
        self.interop.display()
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.interop.resize(width, height)?;
        self.scheduler.resize(width, height);
        Ok(())
    }

    /// Applies held motions, advances any video export by one frame, and
    /// draws one accumulation pass unless an export owns the device.
    pub fn tick<I>(&mut self, motions: I, dt: f64) -> Result<TickOutcome, RenderError>
    where
        I: IntoIterator<Item = CameraMotion>,
    {
        self.camera.apply_motions(motions, dt);
        self.exports.tick();
        self.scheduler.sync_with_export(self.exports.is_busy());
        match self.scheduler.tick(&mut self.interop, &mut self.camera)? {
            Some(counters) => Ok(TickOutcome::Presented(counters)),
            None => Ok(TickOutcome::Skipped),
        }
    }

    pub fn handle_command(&mut self, command: AppCommand) -> CommandOutcome {
        match command {
            AppCommand::Screenshot => {
                self.request(ExportJob::Screenshot {
                    camera: self.camera,
                    settings: self.export_settings.screenshot.clone(),
                });
            }
            AppCommand::GifSweep => {
                self.request(ExportJob::GifSweep {
                    camera: self.camera,
                    settings: self.export_settings.gif.clone(),
                });
            }
            AppCommand::StartVideo => {
                self.request(ExportJob::Video {
                    keyframes: self.keyframes.snapshot(),
                    settings: self.export_settings.video.clone(),
                });
            }
            AppCommand::AddKeyframe => {
                self.keyframes.add(self.camera);
                self.save_keyframes();
                notify(
                    self.status.as_ref(),
                    StatusEvent::KeyframeAdded(self.keyframes.len()),
                );
            }
            AppCommand::ClearKeyframes => {
                self.keyframes.clear();
                self.save_keyframes();
                notify(self.status.as_ref(), StatusEvent::KeyframesCleared);
            }
            AppCommand::SaveCamera => match persist::save_camera(&self.state_file, &self.camera) {
                Ok(()) => notify(
                    self.status.as_ref(),
                    StatusEvent::CameraSaved(self.state_file.clone()),
                ),
                Err(err) => tracing::warn!("failed to save camera: {err}"),
            },
            AppCommand::LoadCamera => match persist::load_camera(&self.state_file) {
                Ok(Some(camera)) => {
                    self.camera = camera;
                    notify(self.status.as_ref(), StatusEvent::CameraLoaded);
                }
                Ok(None) => tracing::debug!(path = %self.state_file.display(), "no saved camera"),
                Err(err) => tracing::warn!("failed to load camera: {err}"),
            },
            AppCommand::Quit => return CommandOutcome::Quit,
        }
        CommandOutcome::Continue
    }

    /// Forwards `job` to the coordinator; the handle is returned for callers
    /// that want to wait, the window loop relies on status events instead.
    pub fn request(&mut self, job: ExportJob) -> Option<ExportHandle> {
        self.exports.request(job)
    }

    fn save_keyframes(&self) {
        if let Err(err) = persist::save_keyframes(&self.keyframe_file, self.keyframes.frames()) {
            tracing::warn!("failed to save keyframes: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{ExportState, PngSequenceEncoder, ScreenshotSettings};
    use crate::keyframes::KEYFRAME_ACCUMULATION;
    use crate::testing::{FakeCompute, FakeDisplay};

    struct Rig {
        app: App<FakeDisplay>,
        dir: tempfile::TempDir,
    }

    fn rig(compute: FakeCompute) -> Rig {
        let dir = tempfile::tempdir().unwrap();
        let compute = Arc::new(compute);
        let config = RendererConfig {
            kernel_source: "kernel trace".into(),
            output_dir: dir.path().join("out"),
            state_file: dir.path().join("camera.toml"),
            keyframe_file: dir.path().join("keyframes.toml"),
            export: ExportSettings {
                screenshot: ScreenshotSettings {
                    height: 9,
                    warmup_passes: 1,
                    passes_per_frame: 1,
                    accumulation: 1,
                },
                ..ExportSettings::default()
            },
            ..RendererConfig::default()
        };
        let display = FakeDisplay::new(&compute);
        let mut app = App::new(
            display,
            compute,
            &config,
            Box::new(PngSequenceEncoder),
            None,
        )
        .unwrap();
        app.resize(32, 16).unwrap();
        Rig { app, dir }
    }

    #[test]
    fn accumulates_while_still_and_resets_on_motion() {
        let mut rig = rig(FakeCompute::new(64));
        let frames: Vec<u32> = (0..3)
            .map(|_| match rig.app.tick([], 0.016).unwrap() {
                TickOutcome::Presented(counters) => counters.accumulation_frame,
                TickOutcome::Skipped => panic!("tick was skipped"),
            })
            .collect();
        assert_eq!(frames, [0, 1, 2]);

        let moved = rig.app.tick([CameraMotion::StrafeLeft], 0.016).unwrap();
        assert!(matches!(
            moved,
            TickOutcome::Presented(FrameCounters {
                accumulation_frame: 0,
                true_frame: 3
            })
        ));
    }

    #[test]
    fn interactive_drawing_pauses_during_export() {
        let (compute, gate) = FakeCompute::new(64).gated();
        let mut rig = rig(compute);
        rig.app.tick([], 0.016).unwrap();

        let handle = rig
            .app
            .request(ExportJob::Screenshot {
                camera: *rig.app.camera(),
                settings: ScreenshotSettings {
                    height: 9,
                    warmup_passes: 0,
                    passes_per_frame: 1,
                    accumulation: 1,
                },
            })
            .unwrap();
        let before = rig.app.camera().frame;
        assert_eq!(rig.app.tick([], 0.016).unwrap(), TickOutcome::Skipped);
        assert_eq!(rig.app.camera().frame, before);

        gate.send(()).unwrap();
        handle.wait().unwrap();
        assert_eq!(rig.app.exports().state(), ExportState::Interactive);
        assert!(matches!(
            rig.app.tick([], 0.016).unwrap(),
            TickOutcome::Presented(_)
        ));
    }

    #[test]
    fn keyframe_commands_persist_the_path() {
        let mut rig = rig(FakeCompute::new(64));
        rig.app.handle_command(AppCommand::AddKeyframe);
        rig.app.tick([CameraMotion::Forward], 0.5).unwrap();
        rig.app.handle_command(AppCommand::AddKeyframe);

        let saved = persist::load_keyframes(&rig.dir.path().join("keyframes.toml")).unwrap();
        assert_eq!(saved.len(), 2);
        assert!(saved.iter().all(|frame| frame.frame == KEYFRAME_ACCUMULATION));
        assert_ne!(saved[0].position, saved[1].position);

        rig.app.handle_command(AppCommand::ClearKeyframes);
        assert!(rig.app.keyframes().is_empty());
        assert!(persist::load_keyframes(&rig.dir.path().join("keyframes.toml"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn camera_round_trips_through_save_and_load() {
        let mut rig = rig(FakeCompute::new(64));
        rig.app.tick([CameraMotion::Rise], 1.0).unwrap();
        let saved = *rig.app.camera();
        rig.app.handle_command(AppCommand::SaveCamera);

        rig.app.tick([CameraMotion::Forward], 1.0).unwrap();
        assert_ne!(rig.app.camera().position, saved.position);

        rig.app.handle_command(AppCommand::LoadCamera);
        assert_eq!(rig.app.camera().position, saved.position);
        assert_eq!(
            rig.app.handle_command(AppCommand::Quit),
            CommandOutcome::Quit
        );
    }
}
