//! Recording fakes for the compute and display domains.
//!
//! Every backend call is appended to a shared event log so tests can assert on
//! ordering (acquire before enqueue, release before present, drop order).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender};

use crate::backend::{ComputeBackend, DisplayBackend};
use crate::error::RenderError;
use crate::kernel::KernelArgs;
use crate::launch::{LaunchConfig, LocalSize};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    Build { local: LocalSize },
    CreateQueue(String),
    CreateBuffer { id: usize, width: u32, height: u32 },
    Enqueue {
        kernel: String,
        buffer: usize,
        args: KernelArgs,
        launch: LaunchConfig,
    },
    Finish(String),
    Read(usize),
    Acquire(usize),
    Release(usize),
    DropQueue(String),
    DropBuffer(usize),
    Configure { width: u32, height: u32 },
    Allocate { storage: usize, bytes: u64 },
    BindView { storage: usize, buffer: usize },
    DisplayFinish,
    Present(usize),
    ReleaseStorage(usize),
}

type EventLog = Arc<Mutex<Vec<Event>>>;

fn record(log: &EventLog, event: Event) {
    if let Ok(mut events) = log.lock() {
        events.push(event);
    }
}

pub(crate) struct FakeKernel {
    name: String,
}

pub(crate) struct FakeBuffer {
    pub id: usize,
    pub width: u32,
    pub height: u32,
    log: EventLog,
}

impl Drop for FakeBuffer {
    fn drop(&mut self) {
        record(&self.log, Event::DropBuffer(self.id));
    }
}

pub(crate) struct FakeQueue {
    label: String,
    log: EventLog,
}

impl Drop for FakeQueue {
    fn drop(&mut self) {
        record(&self.log, Event::DropQueue(self.label.clone()));
    }
}

/// Compute domain fake.
///
/// Kernel sources are line based: every `kernel NAME` line declares one entry
/// point and any source containing `BUILD_ERROR` fails to build. Readback
/// returns `fill` for every pixel, except the optional poisoned pixel which
/// reads back as NaN.
pub(crate) struct FakeCompute {
    log: EventLog,
    next_id: AtomicUsize,
    max_work_group_size: u32,
    fill: [f32; 4],
    poison: Option<(u32, u32)>,
    gate: Option<Receiver<()>>,
    reads: AtomicUsize,
    readback: Readback,
}

#[derive(Clone, Copy)]
enum Readback {
    Ok,
    FailAfter(usize),
    Panic,
}

impl FakeCompute {
    pub fn new(max_work_group_size: u32) -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicUsize::new(1),
            max_work_group_size,
            fill: [0.5, 0.25, 1.0, 1.0],
            poison: None,
            gate: None,
            reads: AtomicUsize::new(0),
            readback: Readback::Ok,
        }
    }

    /// Readbacks succeed `reads` times, then fail with a GPU error.
    pub fn failing_after(mut self, reads: usize) -> Self {
        self.readback = Readback::FailAfter(reads);
        self
    }

    /// Every readback panics, as a crashing driver would.
    pub fn panicking(mut self) -> Self {
        self.readback = Readback::Panic;
        self
    }

    pub fn with_fill(mut self, fill: [f32; 4]) -> Self {
        self.fill = fill;
        self
    }

    pub fn with_poisoned_pixel(mut self, x: u32, y: u32) -> Self {
        self.poison = Some((x, y));
        self
    }

    /// Makes every readback wait for one message on the returned sender.
    pub fn gated(mut self) -> (Self, Sender<()>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.gate = Some(rx);
        (self, tx)
    }

    pub fn events(&self) -> Vec<Event> {
        self.log.lock().map(|events| events.clone()).unwrap_or_default()
    }

    pub fn clear_events(&self) {
        if let Ok(mut events) = self.log.lock() {
            events.clear();
        }
    }

    pub fn enqueued_args(&self) -> Vec<KernelArgs> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Enqueue { args, .. } => Some(args),
                _ => None,
            })
            .collect()
    }

    fn next_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn buffer(&self, width: u32, height: u32) -> FakeBuffer {
        FakeBuffer {
            id: self.next_id(),
            width,
            height,
            log: Arc::clone(&self.log),
        }
    }
}

impl ComputeBackend for FakeCompute {
    type Buffer = FakeBuffer;
    type Queue = FakeQueue;
    type Kernel = FakeKernel;

    fn max_work_group_size(&self) -> u32 {
        self.max_work_group_size
    }

    fn build_kernels(
        &self,
        source: &str,
        local: LocalSize,
    ) -> Result<Vec<Self::Kernel>, RenderError> {
        record(&self.log, Event::Build { local });
        if source.contains("BUILD_ERROR") {
            return Err(RenderError::Build {
                log: "error: unexpected token BUILD_ERROR".into(),
            });
        }
        let kernels: Vec<FakeKernel> = source
            .lines()
            .filter_map(|line| line.trim().strip_prefix("kernel "))
            .map(|name| FakeKernel {
                name: name.trim().to_string(),
            })
            .collect();
        if kernels.is_empty() {
            return Err(RenderError::Build {
                log: "program declares no kernels".into(),
            });
        }
        Ok(kernels)
    }

    fn kernel_name<'a>(&self, kernel: &'a Self::Kernel) -> &'a str {
        &kernel.name
    }

    fn create_queue(&self, label: &str) -> Result<Self::Queue, RenderError> {
        record(&self.log, Event::CreateQueue(label.to_string()));
        Ok(FakeQueue {
            label: label.to_string(),
            log: Arc::clone(&self.log),
        })
    }

    fn create_buffer(&self, width: u32, height: u32) -> Result<Self::Buffer, RenderError> {
        let buffer = self.buffer(width, height);
        record(
            &self.log,
            Event::CreateBuffer {
                id: buffer.id,
                width,
                height,
            },
        );
        Ok(buffer)
    }

    fn enqueue(
        &self,
        _queue: &mut Self::Queue,
        kernel: &Self::Kernel,
        buffer: &Self::Buffer,
        args: &KernelArgs,
        launch: &LaunchConfig,
    ) -> Result<(), RenderError> {
        record(
            &self.log,
            Event::Enqueue {
                kernel: kernel.name.clone(),
                buffer: buffer.id,
                args: *args,
                launch: *launch,
            },
        );
        Ok(())
    }

    fn finish(&self, queue: &mut Self::Queue) -> Result<(), RenderError> {
        record(&self.log, Event::Finish(queue.label.clone()));
        Ok(())
    }

    fn read_buffer(
        &self,
        _queue: &mut Self::Queue,
        buffer: &Self::Buffer,
    ) -> Result<Vec<[f32; 4]>, RenderError> {
        if let Some(gate) = &self.gate {
            gate.recv().map_err(|_| RenderError::WorkerDisconnected)?;
        }
        let done = self.reads.fetch_add(1, Ordering::Relaxed);
        match self.readback {
            Readback::Ok => {}
            Readback::FailAfter(limit) if done < limit => {}
            Readback::FailAfter(_) => return Err(RenderError::gpu("readback failed")),
            Readback::Panic => panic!("readback crashed"),
        }
        record(&self.log, Event::Read(buffer.id));
        let mut pixels = vec![self.fill; buffer.width as usize * buffer.height as usize];
        if let Some((x, y)) = self.poison {
            if x < buffer.width && y < buffer.height {
                pixels[(y * buffer.width + x) as usize] = [f32::NAN, 0.5, 0.5, 1.0];
            }
        }
        Ok(pixels)
    }

    fn acquire_shared(
        &self,
        _queue: &mut Self::Queue,
        buffer: &Self::Buffer,
    ) -> Result<(), RenderError> {
        record(&self.log, Event::Acquire(buffer.id));
        Ok(())
    }

    fn release_shared(
        &self,
        _queue: &mut Self::Queue,
        buffer: &Self::Buffer,
    ) -> Result<(), RenderError> {
        record(&self.log, Event::Release(buffer.id));
        Ok(())
    }
}

pub(crate) struct FakeStorage {
    pub id: usize,
    pub width: u32,
    pub height: u32,
}

/// Display domain fake sharing the compute fake's event log.
pub(crate) struct FakeDisplay {
    log: EventLog,
    next_id: usize,
}

impl FakeDisplay {
    pub fn new(compute: &FakeCompute) -> Self {
        Self {
            log: Arc::clone(&compute.log),
            next_id: 1000,
        }
    }
}

impl DisplayBackend for FakeDisplay {
    type Compute = FakeCompute;
    type Storage = FakeStorage;

    fn configure(&mut self, width: u32, height: u32) {
        record(&self.log, Event::Configure { width, height });
    }

    fn allocate(
        &mut self,
        width: u32,
        height: u32,
        bytes: u64,
    ) -> Result<Self::Storage, RenderError> {
        let id = self.next_id;
        self.next_id += 1;
        record(&self.log, Event::Allocate { storage: id, bytes });
        Ok(FakeStorage { id, width, height })
    }

    fn bind_compute_view(
        &mut self,
        compute: &Self::Compute,
        storage: &Self::Storage,
    ) -> Result<FakeBuffer, RenderError> {
        let buffer = compute.buffer(storage.width, storage.height);
        record(
            &self.log,
            Event::BindView {
                storage: storage.id,
                buffer: buffer.id,
            },
        );
        Ok(buffer)
    }

    fn finish(&mut self) -> Result<(), RenderError> {
        record(&self.log, Event::DisplayFinish);
        Ok(())
    }

    fn present(&mut self, storage: &Self::Storage) -> Result<(), RenderError> {
        record(&self.log, Event::Present(storage.id));
        Ok(())
    }

    fn release(&mut self, storage: Self::Storage) {
        record(&self.log, Event::ReleaseStorage(storage.id));
    }
}
