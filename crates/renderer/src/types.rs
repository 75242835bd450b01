use std::path::PathBuf;

use crate::compile::DEFAULT_KERNEL;
use crate::export::ExportSettings;

/// Adapter selection hint forwarded to wgpu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    Low,
    #[default]
    High,
}

impl std::fmt::Display for GpuPowerPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpuPowerPreference::Low => f.write_str("low"),
            GpuPowerPreference::High => f.write_str("high"),
        }
    }
}

/// Immutable configuration passed to the renderer at start-up.
///
/// `RendererConfig` mirrors CLI flags: which kernel program to build, how large
/// the interactive window starts, and where camera state and exports live.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Initial window size in physical pixels.
    pub surface_size: (u32, u32),
    /// WGSL kernel source, without the argument prelude.
    pub kernel_source: String,
    /// Human-readable origin of `kernel_source`, used in logs and the title.
    pub kernel_label: String,
    pub gpu_power: GpuPowerPreference,
    /// Directory receiving screenshots, gifs and videos.
    pub output_dir: PathBuf,
    /// Saved camera record (load with K, save with L).
    pub state_file: PathBuf,
    /// Keyframe path record, rewritten on every add/clear.
    pub keyframe_file: PathBuf,
    pub export: ExportSettings,
}

impl Default for RendererConfig {
    /// A 720p window over the built-in kernel, writing into the working directory.
    fn default() -> Self {
        Self {
            surface_size: (1280, 720),
            kernel_source: DEFAULT_KERNEL.to_string(),
            kernel_label: "built-in scatter kernel".to_string(),
            gpu_power: GpuPowerPreference::default(),
            output_dir: PathBuf::from("."),
            state_file: PathBuf::from("camera.toml"),
            keyframe_file: PathBuf::from("keyframes.toml"),
            export: ExportSettings::default(),
        }
    }
}
