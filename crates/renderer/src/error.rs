use std::path::PathBuf;

/// Failures surfaced by the rendering and export layers.
///
/// Each variant is terminal only for the subsystem that produced it: a build
/// failure disables kernels, a failed export ends that job, and the
/// interactive loop keeps running either way.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("kernel program failed to build:\n{log}")]
    Build { log: String },
    #[error("captures are disabled because the kernel program did not build")]
    CaptureDisabled,
    #[error("GPU error: {0}")]
    Gpu(String),
    #[error("presentation surface was lost or is outdated")]
    SurfaceLost,
    #[error("surface error: {0}")]
    Surface(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("failed to read or write {path}: {message}")]
    Persist { path: PathBuf, message: String },
    #[error("a fly-through needs at least two keyframes, found {0}")]
    NotEnoughKeyframes(usize),
    #[error("export worker stopped before reporting a result")]
    WorkerDisconnected,
}

impl RenderError {
    pub(crate) fn gpu(message: impl Into<String>) -> Self {
        RenderError::Gpu(message.into())
    }
}
