//! Seams between the orchestration layer and the two execution domains.
//!
//! [`ComputeBackend`] runs kernels against pixel buffers; [`DisplayBackend`]
//! owns the storage those buffers alias and blits it to the visible surface.
//! The wgpu implementation lives in [`crate::gpu`]; tests drive the same
//! orchestration through a recording fake.

use crate::error::RenderError;
use crate::kernel::KernelArgs;
use crate::launch::{LaunchConfig, LocalSize};

/// Bytes per pixel in every buffer the kernels write: four `f32` channels.
pub const BYTES_PER_PIXEL: u64 = 16;

pub fn buffer_bytes(width: u32, height: u32) -> u64 {
    u64::from(width) * u64::from(height) * BYTES_PER_PIXEL
}

pub trait ComputeBackend: Send + Sync + 'static {
    /// Pixel buffer the kernels write, `width * height` RGBA float texels.
    type Buffer: Send + Sync;
    /// Command queue. Dispatches on one queue never overlap.
    type Queue: Send;
    /// One compiled entry point of the kernel program.
    type Kernel: Send + Sync;

    fn max_work_group_size(&self) -> u32;

    /// Compiles `source`, returning kernels in program-enumeration order.
    fn build_kernels(
        &self,
        source: &str,
        local: LocalSize,
    ) -> Result<Vec<Self::Kernel>, RenderError>;

    fn kernel_name<'a>(&self, kernel: &'a Self::Kernel) -> &'a str;

    fn create_queue(&self, label: &str) -> Result<Self::Queue, RenderError>;

    /// Allocates a private buffer for offscreen work.
    fn create_buffer(&self, width: u32, height: u32) -> Result<Self::Buffer, RenderError>;

    fn enqueue(
        &self,
        queue: &mut Self::Queue,
        kernel: &Self::Kernel,
        buffer: &Self::Buffer,
        args: &KernelArgs,
        launch: &LaunchConfig,
    ) -> Result<(), RenderError>;

    /// Blocks until every command enqueued on `queue` has completed.
    fn finish(&self, queue: &mut Self::Queue) -> Result<(), RenderError>;

    /// Blocking readback of the whole buffer, one entry per pixel.
    fn read_buffer(
        &self,
        queue: &mut Self::Queue,
        buffer: &Self::Buffer,
    ) -> Result<Vec<[f32; 4]>, RenderError>;

    /// Hands a display-owned buffer to the compute domain.
    fn acquire_shared(
        &self,
        queue: &mut Self::Queue,
        buffer: &Self::Buffer,
    ) -> Result<(), RenderError>;

    /// Returns a buffer taken with [`ComputeBackend::acquire_shared`].
    fn release_shared(
        &self,
        queue: &mut Self::Queue,
        buffer: &Self::Buffer,
    ) -> Result<(), RenderError>;
}

pub trait DisplayBackend {
    type Compute: ComputeBackend;
    /// Display-side raw storage backing the interactive pixel buffer.
    type Storage;

    /// Resizes the visible surface; storage is reallocated separately.
    fn configure(&mut self, width: u32, height: u32);

    fn allocate(&mut self, width: u32, height: u32, bytes: u64)
        -> Result<Self::Storage, RenderError>;

    /// Creates the compute-side view onto `storage`.
    fn bind_compute_view(
        &mut self,
        compute: &Self::Compute,
        storage: &Self::Storage,
    ) -> Result<<Self::Compute as ComputeBackend>::Buffer, RenderError>;

    /// Blocks until pending display-domain work has completed.
    fn finish(&mut self) -> Result<(), RenderError>;

    /// Copies `storage` into the visible surface.
    fn present(&mut self, storage: &Self::Storage) -> Result<(), RenderError>;

    fn release(&mut self, storage: Self::Storage);
}
