//! Offscreen multi-pass renders on a private buffer and queue.

use std::sync::Arc;

use image::{Rgb, RgbImage};

use crate::backend::ComputeBackend;
use crate::camera::CameraState;
use crate::error::RenderError;
use crate::kernel::{KernelArgs, KernelProgram};
use crate::launch::LaunchPlanner;

/// Width of a 16:9 capture of the given height.
pub fn capture_width(height: u32) -> u32 {
    (u64::from(height) * 16 / 9) as u32
}

/// Pass budget for one capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapturePasses {
    pub warmup: u32,
    pub samples: u32,
}

impl CapturePasses {
    /// `samples = target * passes_per_frame`, where the target is `override`
    /// or the camera's own accumulation frame, floored at one.
    pub fn for_camera(
        camera: &CameraState,
        warmup: u32,
        passes_per_frame: u32,
        accumulation_override: Option<u32>,
    ) -> Self {
        let target = accumulation_override.unwrap_or(camera.frame).max(1);
        Self {
            warmup,
            samples: target.saturating_mul(passes_per_frame.max(1)),
        }
    }
}

pub struct OffscreenCaptureEngine<C: ComputeBackend> {
    compute: Arc<C>,
    program: Arc<KernelProgram<C>>,
    planner: LaunchPlanner,
}

impl<C: ComputeBackend> OffscreenCaptureEngine<C> {
    pub fn new(compute: Arc<C>, program: Arc<KernelProgram<C>>, planner: LaunchPlanner) -> Self {
        Self {
            compute,
            program,
            planner,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.program.is_enabled()
    }

    /// Renders `camera` at `width`x`height` and reads the result back.
    ///
    /// Warmup passes run with accumulation frame 0 and true frames
    /// `0..warmup`; sample passes use accumulation frames `0..samples` with
    /// the true frame continuing from the warmup. The private buffer and
    /// queue are dropped before returning.
    pub fn capture(
        &self,
        camera: &CameraState,
        width: u32,
        height: u32,
        passes: CapturePasses,
    ) -> Result<RgbImage, RenderError> {
        if !self.program.is_enabled() {
            return Err(RenderError::CaptureDisabled);
        }

        let compute = self.compute.as_ref();
        let launch = self.planner.plan(width, height);
        let buffer = compute.create_buffer(width, height)?;
        let mut queue = compute.create_queue("capture")?;
        tracing::debug!(
            width,
            height,
            warmup = passes.warmup,
            samples = passes.samples,
            "starting offscreen capture"
        );

        let mut true_frame = 0u32;
        for _ in 0..passes.warmup {
            let args = KernelArgs::new(width, height, camera, 0, true_frame);
            self.program
                .dispatch_all(compute, &mut queue, &buffer, &args, &launch)?;
            compute.finish(&mut queue)?;
            true_frame += 1;
        }
        for accumulation_frame in 0..passes.samples {
            let args = KernelArgs::new(width, height, camera, accumulation_frame, true_frame);
            self.program
                .dispatch_all(compute, &mut queue, &buffer, &args, &launch)?;
            compute.finish(&mut queue)?;
            true_frame += 1;
        }

        let pixels = compute.read_buffer(&mut queue, &buffer)?;
        Ok(to_rgb_image(&pixels, width, height))
    }
}

/// Converts float pixels to 8-bit RGB by scaling by 255 and truncating.
///
/// A pixel with any non-finite channel is logged and left black.
pub fn to_rgb_image(pixels: &[[f32; 4]], width: u32, height: u32) -> RgbImage {
    let mut image = RgbImage::new(width, height);
    for (index, pixel) in pixels
        .iter()
        .take(width as usize * height as usize)
        .enumerate()
    {
        let x = (index % width as usize) as u32;
        let y = (index / width as usize) as u32;
        if !pixel.iter().all(|channel| channel.is_finite()) {
            tracing::warn!(x, y, value = ?pixel, "skipping non-finite pixel");
            continue;
        }
        // `as` saturates, so out-of-range samples clamp to 0 or 255.
        let [r, g, b, _] = pixel.map(|channel| (channel * 255.0) as u8);
        image.put_pixel(x, y, Rgb([r, g, b]));
    }
    image
}
