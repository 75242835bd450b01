//! One pixel buffer shared by the display surface and the compute queue.
//!
//! The display domain owns the raw storage; the compute domain only ever sees
//! a view bound onto it. Every compute access happens inside an
//! acquire/release bracket, and each domain is drained before the other
//! touches the buffer, so kernel writes land before the present reads them.

use std::sync::Arc;

use crate::backend::{buffer_bytes, ComputeBackend, DisplayBackend};
use crate::error::RenderError;

type ComputeOf<D> = <D as DisplayBackend>::Compute;
type BufferOf<D> = <ComputeOf<D> as ComputeBackend>::Buffer;
type QueueOf<D> = <ComputeOf<D> as ComputeBackend>::Queue;

pub struct SharedBufferInterop<D: DisplayBackend> {
    display: D,
    compute: Arc<D::Compute>,
    view: Option<BufferOf<D>>,
    queue: Option<QueueOf<D>>,
    storage: Option<D::Storage>,
    width: u32,
    height: u32,
}

impl<D: DisplayBackend> SharedBufferInterop<D> {
    /// Creates the interactive queue. Storage is allocated by the first
    /// [`SharedBufferInterop::resize`].
    pub fn new(display: D, compute: Arc<D::Compute>) -> Result<Self, RenderError> {
        let queue = compute.create_queue("interactive")?;
        Ok(Self {
            display,
            compute,
            view: None,
            queue: Some(queue),
            storage: None,
            width: 0,
            height: 0,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn compute(&self) -> &Arc<D::Compute> {
        &self.compute
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    /// Reallocates storage for `width * height` pixels and rebinds the
    /// compute view onto it. A zero-sized request (minimised window) keeps
    /// the current allocation.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if width == 0 || height == 0 {
            return Ok(());
        }

        self.view = None;
        if let Some(previous) = self.storage.take() {
            self.display.release(previous);
        }

        self.display.configure(width, height);
        let storage = self
            .display
            .allocate(width, height, buffer_bytes(width, height))?;
        let view = self.display.bind_compute_view(&self.compute, &storage)?;
        self.storage = Some(storage);
        self.view = Some(view);
        self.width = width;
        self.height = height;
        tracing::debug!(width, height, "reallocated shared pixel buffer");
        Ok(())
    }

    /// Runs `render` against the shared buffer and presents the result.
    ///
    /// Returns `Ok(false)` without touching either domain when no storage has
    /// been allocated yet. The buffer is released back to the display domain
    /// even when `render` fails; the present is skipped in that case.
    pub fn draw<F>(&mut self, render: F) -> Result<bool, RenderError>
    where
        F: FnOnce(&D::Compute, &mut QueueOf<D>, &BufferOf<D>) -> Result<(), RenderError>,
    {
        let (Some(view), Some(queue), Some(storage)) =
            (self.view.as_ref(), self.queue.as_mut(), self.storage.as_ref())
        else {
            return Ok(false);
        };

        self.display.finish()?;
        self.compute.acquire_shared(queue, view)?;
        let rendered = render(&self.compute, queue, view);
        let released = self.compute.release_shared(queue, view);
        rendered?;
        released?;
        self.compute.finish(queue)?;
        self.display.present(storage)?;
        Ok(true)
    }
}

impl<D: DisplayBackend> Drop for SharedBufferInterop<D> {
    fn drop(&mut self) {
        drop(self.view.take());
        drop(self.queue.take());
        if let Some(storage) = self.storage.take() {
            self.display.release(storage);
        }
    }
}
