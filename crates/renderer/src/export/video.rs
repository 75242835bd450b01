//! Video container writers for keyframe fly-throughs.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use image::RgbImage;

use crate::error::RenderError;

use super::files::{unique_dir_in, unique_file_in};

/// Opens one output container per video segment.
pub trait VideoEncoder: Send {
    fn open(
        &self,
        dir: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Box<dyn VideoSegment>, RenderError>;
}

pub trait VideoSegment: Send {
    fn path(&self) -> &Path;
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), RenderError>;
    /// Flushes the container and returns where it was written.
    fn close(self: Box<Self>) -> Result<PathBuf, RenderError>;
}

/// Pipes raw RGB frames into `ffmpeg`, which muxes an MJPEG AVI.
pub struct FfmpegEncoder {
    program: PathBuf,
}

impl FfmpegEncoder {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
        }
    }

    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn open(
        &self,
        dir: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<Box<dyn VideoSegment>, RenderError> {
        fs::create_dir_all(dir)?;
        let path = unique_file_in(dir, "video", "avi");
        let mut child = Command::new(&self.program)
            .args(["-y", "-loglevel", "error", "-f", "rawvideo", "-pix_fmt", "rgb24"])
            .arg("-s")
            .arg(format!("{width}x{height}"))
            .arg("-r")
            .arg(fps.to_string())
            .args(["-i", "-", "-c:v", "mjpeg", "-q:v", "2"])
            .arg(&path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RenderError::Io(std::io::Error::other("ffmpeg stdin unavailable")))?;
        tracing::debug!(path = %path.display(), width, height, fps, "opened video segment");
        Ok(Box::new(FfmpegSegment {
            path,
            stdin: Some(stdin),
            child: Some(child),
        }))
    }
}

struct FfmpegSegment {
    path: PathBuf,
    stdin: Option<ChildStdin>,
    child: Option<Child>,
}

impl VideoSegment for FfmpegSegment {
    fn path(&self) -> &Path {
        &self.path
    }

    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), RenderError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| RenderError::Io(std::io::Error::other("video segment already closed")))?;
        stdin.write_all(frame.as_raw())?;
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<PathBuf, RenderError> {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let status = child.wait()?;
            if !status.success() {
                return Err(RenderError::Io(std::io::Error::other(format!(
                    "ffmpeg exited with {status} while writing {}",
                    self.path.display()
                ))));
            }
        }
        Ok(self.path.clone())
    }
}

impl Drop for FfmpegSegment {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.wait();
        }
    }
}

/// Writes each segment as a `videoN/frameNNNNN.png` sequence.
#[derive(Debug, Default)]
pub struct PngSequenceEncoder;

impl VideoEncoder for PngSequenceEncoder {
    fn open(
        &self,
        dir: &Path,
        _width: u32,
        _height: u32,
        _fps: u32,
    ) -> Result<Box<dyn VideoSegment>, RenderError> {
        let path = unique_dir_in(dir, "video")?;
        Ok(Box::new(PngSequence { path, frames: 0 }))
    }
}

struct PngSequence {
    path: PathBuf,
    frames: u32,
}

impl VideoSegment for PngSequence {
    fn path(&self) -> &Path {
        &self.path
    }

    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), RenderError> {
        frame.save(self.path.join(format!("frame{:05}.png", self.frames)))?;
        self.frames += 1;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<PathBuf, RenderError> {
        Ok(self.path.clone())
    }
}

/// `ffmpeg` when it can be run, otherwise a PNG sequence.
pub fn default_encoder() -> Box<dyn VideoEncoder> {
    let ffmpeg = FfmpegEncoder::new();
    if ffmpeg.is_available() {
        Box::new(ffmpeg)
    } else {
        tracing::warn!("ffmpeg not found; fly-throughs will be written as PNG sequences");
        Box::new(PngSequenceEncoder)
    }
}
