//! wgpu implementation of the compute and display domains.
//!
//! - `context` owns instance/adapter/device bring-up, for both the windowed
//!   path (with a surface) and headless captures.
//! - `compute` implements [`crate::backend::ComputeBackend`]: one compute
//!   pipeline per kernel entry point, command batches as queues, and blocking
//!   readback through a mapped staging buffer.
//! - `display` implements [`crate::backend::DisplayBackend`]: the storage
//!   buffer the kernels write is drawn straight to the swapchain by a
//!   fullscreen triangle, so presentation needs no copy.

mod compute;
mod context;
mod display;

pub use compute::{WgpuCompute, WgpuKernel, WgpuPixelBuffer, WgpuQueue};
pub use context::headless_compute;
pub use display::{DisplayStorage, WgpuDisplay};
