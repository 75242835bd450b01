use std::fmt;
use std::path::PathBuf;

use crossbeam_channel::{Receiver, Sender};

use crate::export::ExportKind;

/// User-facing notifications from the export and persistence layers.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    ExportStarted(ExportKind),
    ExportProgress {
        kind: ExportKind,
        done: u32,
        total: u32,
    },
    Saved(PathBuf),
    ExportFinished(ExportKind),
    ExportFailed {
        kind: ExportKind,
        message: String,
    },
    KeyframeAdded(usize),
    KeyframesCleared,
    CameraSaved(PathBuf),
    CameraLoaded,
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusEvent::ExportStarted(kind) => write!(f, "rendering {kind}"),
            StatusEvent::ExportProgress { kind, done, total } => {
                write!(f, "rendering {kind} {done}/{total}")
            }
            StatusEvent::Saved(path) => write!(f, "saved {}", path.display()),
            StatusEvent::ExportFinished(kind) => write!(f, "{kind} done"),
            StatusEvent::ExportFailed { kind, message } => write!(f, "{kind} failed: {message}"),
            StatusEvent::KeyframeAdded(count) => write!(f, "added keyframe {count}"),
            StatusEvent::KeyframesCleared => f.write_str("cleared keyframes"),
            StatusEvent::CameraSaved(path) => write!(f, "saved camera to {}", path.display()),
            StatusEvent::CameraLoaded => f.write_str("loaded camera"),
        }
    }
}

pub fn status_channel() -> (Sender<StatusEvent>, Receiver<StatusEvent>) {
    crossbeam_channel::unbounded()
}

/// Sends `event` if anyone is listening; a closed channel is not an error.
pub(crate) fn notify(status: Option<&Sender<StatusEvent>>, event: StatusEvent) {
    tracing::debug!(%event, "status");
    if let Some(tx) = status {
        let _ = tx.send(event);
    }
}
