use anyhow::{anyhow, bail, Context as AnyhowContext, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;

use crate::types::GpuPowerPreference;

use super::compute::WgpuCompute;

/// Device, queue and configured swapchain for the interactive window.
pub(crate) struct GpuContext {
    _instance: wgpu::Instance,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    limits: wgpu::Limits,
    surface_config: wgpu::SurfaceConfiguration,
    pub size: PhysicalSize<u32>,
    pub surface_format: wgpu::TextureFormat,
}

impl GpuContext {
    pub(crate) fn new<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        gpu_power: GpuPowerPreference,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let instance = create_instance();
        let raw_window = target
            .window_handle()
            .map_err(|err| anyhow!("window handle unavailable: {err}"))?
            .as_raw();
        let raw_display = target
            .display_handle()
            .map_err(|err| anyhow!("display handle unavailable: {err}"))?
            .as_raw();

        // SAFETY: the window outlives the display backend that owns this surface.
        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: raw_display,
                raw_window_handle: raw_window,
            })
        }
        .context("failed to create window surface")?;

        let adapter = request_adapter(&instance, gpu_power, Some(&surface))?;
        let (device, queue, limits) = request_device(&adapter, "scatterlight device")?;

        let size = PhysicalSize::new(initial_size.width.max(1), initial_size.height.max(1));
        check_surface_size(&limits, size)?;

        let surface_config =
            surface_configuration(&surface.get_capabilities(&adapter), size)?;
        surface.configure(&device, &surface_config);

        Ok(Self {
            _instance: instance,
            surface,
            device,
            queue,
            limits,
            size,
            surface_format: surface_config.format,
            surface_config,
        })
    }

    /// Reconfigures the swapchain; zero-area sizes (minimised windows) are ignored.
    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.surface_config.width = new_size.width;
        self.surface_config.height = new_size.height;
        self.surface.configure(&self.device, &self.surface_config);
    }

    /// Compute domain sharing this context's device and queue.
    pub(crate) fn compute(&self) -> WgpuCompute {
        WgpuCompute::new(self.device.clone(), self.queue.clone(), &self.limits)
    }
}

/// Brings up a device with no surface, for captures that never open a window.
pub fn headless_compute(gpu_power: GpuPowerPreference) -> Result<WgpuCompute> {
    let instance = create_instance();
    let adapter = request_adapter(&instance, gpu_power, None)?;
    let (device, queue, limits) = request_device(&adapter, "scatterlight headless device")?;
    Ok(WgpuCompute::new(device, queue, &limits))
}

fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        backend_options: wgpu::BackendOptions::default(),
    })
}

fn request_adapter(
    instance: &wgpu::Instance,
    gpu_power: GpuPowerPreference,
    surface: Option<&wgpu::Surface<'static>>,
) -> Result<wgpu::Adapter> {
    let power_preference = match gpu_power {
        GpuPowerPreference::Low => wgpu::PowerPreference::LowPower,
        GpuPowerPreference::High => wgpu::PowerPreference::HighPerformance,
    };
    pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference,
        compatible_surface: surface,
        force_fallback_adapter: false,
    }))
    .with_context(|| format!("no GPU adapter matches power preference '{gpu_power}'"))
}

fn request_device(
    adapter: &wgpu::Adapter,
    label: &str,
) -> Result<(wgpu::Device, wgpu::Queue, wgpu::Limits)> {
    let info = adapter.get_info();
    let limits = adapter.limits();
    tracing::debug!(
        name = %info.name,
        backend = ?info.backend,
        device_type = ?info.device_type,
        max_invocations = limits.max_compute_invocations_per_workgroup,
        "selected GPU adapter"
    );

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some(label),
        required_features: wgpu::Features::empty(),
        required_limits: limits.clone(),
        memory_hints: wgpu::MemoryHints::Performance,
        trace: wgpu::Trace::default(),
    }))
    .with_context(|| format!("failed to open {label}"))?;
    Ok((device, queue, limits))
}

fn check_surface_size(limits: &wgpu::Limits, size: PhysicalSize<u32>) -> Result<()> {
    let max = limits.max_texture_dimension_2d;
    if size.width > max || size.height > max {
        bail!(
            "window of {}x{} exceeds the adapter's {max} pixel texture limit",
            size.width,
            size.height
        );
    }
    Ok(())
}

/// Prefers a linear format so kernel output reaches the screen unchanged,
/// and FIFO presentation.
fn surface_configuration(
    caps: &wgpu::SurfaceCapabilities,
    size: PhysicalSize<u32>,
) -> Result<wgpu::SurfaceConfiguration> {
    let format = caps
        .formats
        .iter()
        .copied()
        .find(|format| !format.is_srgb())
        .or_else(|| caps.formats.first().copied())
        .ok_or_else(|| anyhow!("surface reports no supported formats"))?;
    if format.is_srgb() {
        tracing::warn!(?format, "no linear surface format; kernel output will be re-encoded");
    }

    let present_mode = if caps.present_modes.contains(&wgpu::PresentMode::Fifo) {
        wgpu::PresentMode::Fifo
    } else {
        caps.present_modes
            .first()
            .copied()
            .unwrap_or(wgpu::PresentMode::Fifo)
    };
    let alpha_mode = caps
        .alpha_modes
        .first()
        .copied()
        .unwrap_or(wgpu::CompositeAlphaMode::Auto);
    tracing::debug!(?present_mode, ?format, "configuring surface");

    Ok(wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: size.width,
        height: size.height,
        present_mode,
        alpha_mode,
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    })
}
