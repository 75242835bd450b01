use wgpu::util::DeviceExt;

use crate::backend::{buffer_bytes, ComputeBackend, BYTES_PER_PIXEL};
use crate::compile::{build_failure, compute_entry_points, create_kernel_module, wrap_kernel_source};
use crate::error::RenderError;
use crate::kernel::KernelArgs;
use crate::launch::{LaunchConfig, LocalSize};

const ARGS_SIZE: u64 = std::mem::size_of::<KernelArgs>() as u64;

/// Compute domain on a wgpu device.
///
/// Kernels share one pipeline layout: the pixel buffer at binding 0 and the
/// argument block at binding 1.
pub struct WgpuCompute {
    device: wgpu::Device,
    queue: wgpu::Queue,
    max_work_group_size: u32,
    max_buffer_size: u64,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
}

pub struct WgpuKernel {
    name: String,
    pipeline: wgpu::ComputePipeline,
}

pub struct WgpuPixelBuffer {
    pub(crate) buffer: wgpu::Buffer,
    width: u32,
    height: u32,
}

impl WgpuPixelBuffer {
    pub(crate) fn new(buffer: wgpu::Buffer, width: u32, height: u32) -> Self {
        Self {
            buffer,
            width,
            height,
        }
    }

    fn size(&self) -> u64 {
        buffer_bytes(self.width, self.height).max(BYTES_PER_PIXEL)
    }
}

/// Command batch recorded on the device queue.
///
/// Dispatches are encoded into one encoder and only submitted on `finish`, so
/// two `WgpuQueue`s never interleave their passes inside a submission.
pub struct WgpuQueue {
    label: String,
    encoder: Option<wgpu::CommandEncoder>,
    args: wgpu::Buffer,
}

impl WgpuCompute {
    pub(crate) fn new(device: wgpu::Device, queue: wgpu::Queue, limits: &wgpu::Limits) -> Self {
        let max_work_group_size = limits.max_compute_invocations_per_workgroup.min(
            limits
                .max_compute_workgroup_size_x
                .saturating_mul(limits.max_compute_workgroup_size_y),
        );
        let max_buffer_size = limits
            .max_buffer_size
            .min(u64::from(limits.max_storage_buffer_binding_size));

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kernel layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(ARGS_SIZE),
                    },
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("kernel pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        Self {
            device,
            queue,
            max_work_group_size,
            max_buffer_size,
            bind_group_layout,
            pipeline_layout,
        }
    }

    pub(crate) fn check_buffer_size(&self, width: u32, height: u32) -> Result<u64, RenderError> {
        let bytes = buffer_bytes(width, height).max(BYTES_PER_PIXEL);
        if bytes > self.max_buffer_size {
            return Err(RenderError::gpu(format!(
                "{width}x{height} needs a {bytes} byte buffer, device limit is {}",
                self.max_buffer_size
            )));
        }
        Ok(bytes)
    }

    fn poll_wait(&self) -> Result<(), RenderError> {
        self.device
            .poll(wgpu::PollType::Wait)
            .map(|_| ())
            .map_err(|err| RenderError::gpu(format!("device poll failed: {err}")))
    }
}

impl ComputeBackend for WgpuCompute {
    type Buffer = WgpuPixelBuffer;
    type Queue = WgpuQueue;
    type Kernel = WgpuKernel;

    fn max_work_group_size(&self) -> u32 {
        self.max_work_group_size
    }

    fn build_kernels(
        &self,
        source: &str,
        local: LocalSize,
    ) -> Result<Vec<Self::Kernel>, RenderError> {
        let wrapped = wrap_kernel_source(source, local);
        let entry_points = compute_entry_points(&wrapped)?;
        let module = create_kernel_module(&self.device, wrapped);

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let kernels: Vec<WgpuKernel> = entry_points
            .into_iter()
            .map(|name| {
                let pipeline =
                    self.device
                        .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                            label: Some(&name),
                            layout: Some(&self.pipeline_layout),
                            module: &module,
                            entry_point: Some(&name),
                            compilation_options: wgpu::PipelineCompilationOptions::default(),
                            cache: None,
                        });
                WgpuKernel { name, pipeline }
            })
            .collect();
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(build_failure(err.to_string()));
        }
        Ok(kernels)
    }

    fn kernel_name<'a>(&self, kernel: &'a Self::Kernel) -> &'a str {
        &kernel.name
    }

    fn create_queue(&self, label: &str) -> Result<Self::Queue, RenderError> {
        let args = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("kernel args"),
            size: ARGS_SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Ok(WgpuQueue {
            label: label.to_string(),
            encoder: None,
            args,
        })
    }

    fn create_buffer(&self, width: u32, height: u32) -> Result<Self::Buffer, RenderError> {
        let size = self.check_buffer_size(width, height)?;
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("capture pixels"),
            size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Ok(WgpuPixelBuffer::new(buffer, width, height))
    }

    fn enqueue(
        &self,
        queue: &mut Self::Queue,
        kernel: &Self::Kernel,
        buffer: &Self::Buffer,
        args: &KernelArgs,
        launch: &LaunchConfig,
    ) -> Result<(), RenderError> {
        let device = &self.device;
        let label = queue.label.as_str();
        let encoder = queue.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
        });

        // Each pass copies its own arguments so later enqueues on the same
        // batch do not overwrite them before submission.
        let staging = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("kernel args staging"),
            contents: bytemuck::bytes_of(args),
            usage: wgpu::BufferUsages::COPY_SRC,
        });
        encoder.copy_buffer_to_buffer(&staging, 0, &queue.args, 0, ARGS_SIZE);

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("kernel bind group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: queue.args.as_entire_binding(),
                },
            ],
        });

        let (groups_x, groups_y) = launch.workgroups();
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(&kernel.name),
            timestamp_writes: None,
        });
        pass.set_pipeline(&kernel.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(groups_x, groups_y, 1);
        Ok(())
    }

    fn finish(&self, queue: &mut Self::Queue) -> Result<(), RenderError> {
        if let Some(encoder) = queue.encoder.take() {
            self.queue.submit(Some(encoder.finish()));
        }
        self.poll_wait()
    }

    fn read_buffer(
        &self,
        queue: &mut Self::Queue,
        buffer: &Self::Buffer,
    ) -> Result<Vec<[f32; 4]>, RenderError> {
        self.finish(queue)?;

        let size = buffer.size();
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback encoder"),
            });
        encoder.copy_buffer_to_buffer(&buffer.buffer, 0, &staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = crossbeam_channel::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.poll_wait()?;
        rx.recv()
            .map_err(|_| RenderError::gpu("readback callback was dropped"))?
            .map_err(|err| RenderError::gpu(format!("failed to map readback buffer: {err}")))?;

        let pixel_count = buffer.width as usize * buffer.height as usize;
        let pixels = {
            let data = slice.get_mapped_range();
            let mut pixels: Vec<[f32; 4]> = bytemuck::pod_collect_to_vec(&data[..]);
            pixels.truncate(pixel_count);
            pixels
        };
        staging.unmap();
        Ok(pixels)
    }

    // wgpu tracks buffer hazards itself, so the bracket only marks the handoff.
    fn acquire_shared(
        &self,
        queue: &mut Self::Queue,
        buffer: &Self::Buffer,
    ) -> Result<(), RenderError> {
        tracing::trace!(queue = %queue.label, size = buffer.size(), "acquire shared buffer");
        Ok(())
    }

    fn release_shared(
        &self,
        queue: &mut Self::Queue,
        buffer: &Self::Buffer,
    ) -> Result<(), RenderError> {
        tracing::trace!(queue = %queue.label, size = buffer.size(), "release shared buffer");
        Ok(())
    }
}
