//! Swish sweeps: a short looping lateral pan rendered to an animated GIF.

use std::f64::consts::TAU;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crossbeam_channel::Sender;
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame};

use crate::backend::ComputeBackend;
use crate::camera::CameraState;
use crate::capture::{capture_width, CapturePasses, OffscreenCaptureEngine};
use crate::error::RenderError;
use crate::status::{notify, StatusEvent};

use super::files::{unique_dir_in, unique_file_in};
use super::{ExportKind, GifSettings};

/// Cameras for each sweep frame.
///
/// Frame `i` is offset by `sin(i / frames * 2π) * move_speed / divisor` along
/// `look × up`, so the last frame leads back into the first.
pub fn swish_cameras(camera: &CameraState, frames: u32, divisor: f64) -> Vec<CameraState> {
    let lateral = camera.look.cross(camera.up);
    (0..frames)
        .map(|index| {
            let phase = f64::from(index) / f64::from(frames) * TAU;
            let offset = phase.sin() * camera.move_speed / divisor;
            CameraState {
                position: camera.position + lateral * offset,
                ..*camera
            }
        })
        .collect()
}

/// Renders every sweep frame to a temporary directory, encodes them into
/// `renderN.gif` and removes the temporary frames.
pub(crate) fn render_gif_sweep<C: ComputeBackend>(
    engine: &OffscreenCaptureEngine<C>,
    camera: &CameraState,
    settings: &GifSettings,
    output_dir: &Path,
    status: Option<&Sender<StatusEvent>>,
) -> Result<PathBuf, RenderError> {
    let height = settings.height;
    let width = capture_width(height);
    let passes = CapturePasses::for_camera(
        camera,
        settings.warmup_passes,
        settings.passes_per_frame,
        Some(settings.accumulation),
    );
    let cameras = swish_cameras(camera, settings.frames, settings.amplitude_divisor);

    let temp = unique_dir_in(output_dir, "temp")?;
    let output = unique_file_in(output_dir, "render", "gif");
    let encoded = render_frames(engine, &cameras, width, height, passes, &temp, status)
        .and_then(|frames| encode_gif(&frames, &output, settings.frame_delay_ms));
    if let Err(err) = fs::remove_dir_all(&temp) {
        tracing::warn!(path = %temp.display(), "failed to remove sweep frames: {err}");
    }
    if encoded.is_err() && output.exists() {
        let _ = fs::remove_file(&output);
    }
    encoded?;
    Ok(output)
}

/// Writes `swishN.png` for every camera into `temp`.
fn render_frames<C: ComputeBackend>(
    engine: &OffscreenCaptureEngine<C>,
    cameras: &[CameraState],
    width: u32,
    height: u32,
    passes: CapturePasses,
    temp: &Path,
    status: Option<&Sender<StatusEvent>>,
) -> Result<Vec<PathBuf>, RenderError> {
    let total = cameras.len() as u32;
    let mut frames = Vec::with_capacity(cameras.len());
    for (index, camera) in cameras.iter().enumerate() {
        let image = engine.capture(camera, width, height, passes)?;
        let path = temp.join(format!("swish{index}.png"));
        image.save(&path)?;
        frames.push(path);
        notify(
            status,
            StatusEvent::ExportProgress {
                kind: ExportKind::GifSweep,
                done: index as u32 + 1,
                total,
            },
        );
    }
    Ok(frames)
}

/// Encodes PNG frames, in order, into an infinitely looping GIF.
pub fn encode_gif(frames: &[PathBuf], output: &Path, delay_ms: u32) -> Result<(), RenderError> {
    let file = BufWriter::new(File::create(output)?);
    let mut encoder = GifEncoder::new(file);
    encoder.set_repeat(Repeat::Infinite)?;
    let delay = Delay::from_numer_denom_ms(delay_ms, 1);
    for path in frames {
        let rgba = image::open(path)?.to_rgba8();
        encoder.encode_frame(Frame::from_parts(rgba, 0, 0, delay))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use glam::DVec3;
    use image::RgbImage;

    use super::*;

    #[test]
    fn sweep_is_a_closed_lateral_sine() {
        let camera = CameraState {
            move_speed: 32.0,
            ..CameraState::default()
        };
        let cameras = swish_cameras(&camera, 4, 32.0);
        assert_eq!(cameras.len(), 4);

        let lateral = camera.look.cross(camera.up);
        let offsets: Vec<f64> = cameras
            .iter()
            .map(|swished| (swished.position - camera.position).dot(lateral))
            .collect();
        let expected = [0.0, 1.0, 0.0, -1.0];
        for (offset, expected) in offsets.iter().zip(expected) {
            assert!((offset - expected).abs() < 1e-9, "{offsets:?}");
        }
        for swished in &cameras {
            assert_eq!(swished.look, camera.look);
            assert_eq!(swished.up, camera.up);
            let drift = swished.position - camera.position;
            assert!(drift.dot(camera.look).abs() < 1e-9);
            assert!(drift.dot(DVec3::Y).abs() < 1e-9);
        }
    }

    #[test]
    fn encodes_frames_into_a_gif() {
        let dir = tempfile::tempdir().unwrap();
        let frames: Vec<PathBuf> = (0..3)
            .map(|index| {
                let path = dir.path().join(format!("swish{index}.png"));
                RgbImage::from_pixel(4, 4, image::Rgb([index * 80, 0, 0]))
                    .save(&path)
                    .unwrap();
                path
            })
            .collect();
        let output = dir.path().join("render0.gif");
        encode_gif(&frames, &output, 100).unwrap();

        let decoded = image::open(&output).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 4));
    }
}
