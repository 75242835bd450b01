//! Exports without a window: the device is brought up with no surface and
//! jobs run through the same coordinator the interactive loop uses.

use std::path::PathBuf;
use std::sync::Arc;

use crate::backend::ComputeBackend;
use crate::capture::OffscreenCaptureEngine;
use crate::error::RenderError;
use crate::export::{AsyncExportCoordinator, ExportJob, ExportState, VideoEncoder};
use crate::kernel::KernelProgram;
use crate::launch::LaunchPlanner;
use crate::persist;
use crate::types::RendererConfig;

/// Which export a headless run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadlessExport {
    /// One screenshot of the saved (or default) camera.
    Screenshot,
    /// The saved keyframe path as a fly-through.
    Video,
}

/// Builds the kernel program on `compute` and runs `export` to completion.
///
/// Returns the written artifacts. Video frames are advanced on the calling
/// thread exactly as the window would, one coordinator tick per frame.
pub fn run_headless<C: ComputeBackend>(
    compute: Arc<C>,
    config: &RendererConfig,
    export: HeadlessExport,
    encoder: Box<dyn VideoEncoder>,
) -> Result<Vec<PathBuf>, RenderError> {
    let planner = LaunchPlanner::new(compute.max_work_group_size());
    let program = Arc::new(KernelProgram::build(
        compute.as_ref(),
        &config.kernel_source,
        planner.local(),
    ));
    if let Some(log) = program.build_error() {
        return Err(RenderError::Build {
            log: log.to_string(),
        });
    }
    let engine = Arc::new(OffscreenCaptureEngine::new(compute, program, planner));
    let mut exports = AsyncExportCoordinator::new(engine, &config.output_dir, encoder);

    let job = match export {
        HeadlessExport::Screenshot => ExportJob::Screenshot {
            camera: persist::load_camera(&config.state_file)?.unwrap_or_default(),
            settings: config.export.screenshot.clone(),
        },
        HeadlessExport::Video => ExportJob::Video {
            keyframes: persist::load_keyframes(&config.keyframe_file)?,
            settings: config.export.video.clone(),
        },
    };
    let handle = exports
        .request(job)
        .ok_or_else(|| RenderError::gpu("export coordinator was already busy"))?;

    if export == HeadlessExport::Video {
        let mut last_progress = 0;
        while exports.tick() != ExportState::Interactive {
            last_progress += 1;
            if last_progress % 25 == 0 {
                tracing::info!(frames = last_progress, "fly-through progress");
            }
        }
    }
    handle.wait()
}
