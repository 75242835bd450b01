use bytemuck::{Pod, Zeroable};

use crate::backend::ComputeBackend;
use crate::camera::CameraState;
use crate::error::RenderError;
use crate::launch::{LaunchConfig, LocalSize};

/// Uniform block handed to every kernel invocation.
///
/// Field order is the kernel argument contract; the pixel buffer itself is
/// bound separately at binding 0. Layout must match `KernelArgs` in the WGSL
/// prelude emitted by `compile.rs`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct KernelArgs {
    pub width: i32,
    pub height: i32,
    _pad0: [i32; 2],
    pub position: [f32; 4],
    pub look: [f32; 4],
    pub up: [f32; 4],
    pub accumulation_frame: i32,
    pub true_frame: i32,
    pub fov: f32,
    _pad1: f32,
}

impl KernelArgs {
    pub fn new(
        width: u32,
        height: u32,
        camera: &CameraState,
        accumulation_frame: u32,
        true_frame: u32,
    ) -> Self {
        Self {
            width: width as i32,
            height: height as i32,
            _pad0: [0; 2],
            position: CameraState::padded(camera.position),
            look: CameraState::padded(camera.look),
            up: CameraState::padded(camera.up),
            accumulation_frame: accumulation_frame as i32,
            true_frame: true_frame as i32,
            fov: camera.fov as f32,
            _pad1: 0.0,
        }
    }
}

/// Compiled kernel program shared by the interactive and offscreen paths.
///
/// A failed build leaves the program empty: every dispatch becomes a no-op and
/// [`KernelProgram::is_enabled`] reports `false` so captures can refuse work.
pub struct KernelProgram<C: ComputeBackend> {
    kernels: Vec<C::Kernel>,
    build_error: Option<String>,
}

impl<C: ComputeBackend> KernelProgram<C> {
    pub fn build(compute: &C, source: &str, local: LocalSize) -> Self {
        match compute.build_kernels(source, local) {
            Ok(kernels) => {
                let names: Vec<&str> = kernels
                    .iter()
                    .map(|kernel| compute.kernel_name(kernel))
                    .collect();
                tracing::info!(count = kernels.len(), ?names, "built kernel program");
                Self {
                    kernels,
                    build_error: None,
                }
            }
            Err(err) => {
                tracing::error!("{err}");
                Self {
                    kernels: Vec::new(),
                    build_error: Some(err.to_string()),
                }
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.kernels.is_empty()
    }

    pub fn build_error(&self) -> Option<&str> {
        self.build_error.as_deref()
    }

    pub fn kernels(&self) -> &[C::Kernel] {
        &self.kernels
    }

    /// Enqueues every kernel, in program order, with identical arguments.
    ///
    /// Returns how many kernels were enqueued; zero when the build failed.
    pub fn dispatch_all(
        &self,
        compute: &C,
        queue: &mut C::Queue,
        buffer: &C::Buffer,
        args: &KernelArgs,
        launch: &LaunchConfig,
    ) -> Result<usize, RenderError> {
        for kernel in &self.kernels {
            compute.enqueue(queue, kernel, buffer, args, launch)?;
        }
        Ok(self.kernels.len())
    }
}
