use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use renderer::{HeadlessExport, Renderer, RendererConfig, DEFAULT_KERNEL};
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::config::AppConfig;
use crate::paths::AppPaths;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Opens the interactive window.
pub fn run(args: RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let config = build_config(args, &paths)?;
    tracing::info!(
        kernel = %config.kernel_label,
        width = config.surface_size.0,
        height = config.surface_size.1,
        gpu_power = %config.gpu_power,
        output_dir = %config.output_dir.display(),
        "starting scatterlight"
    );
    Renderer::new(config).run()
}

/// Runs one export without a window and prints every written path.
pub fn run_headless(args: RunArgs, export: HeadlessExport) -> Result<()> {
    let paths = AppPaths::discover()?;
    let config = build_config(args, &paths)?;
    tracing::info!(?export, kernel = %config.kernel_label, "starting headless export");
    let written = Renderer::new(config).run_headless(export)?;
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}

/// Prints where this invocation would read and write, flags included.
pub fn print_paths(args: &RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let locations = Locations::resolve(args, &paths);
    println!("config: {}", locations.config_file.display());
    println!("camera: {}", locations.state_file.display());
    println!("keyframes: {}", locations.keyframe_file.display());
    println!("output: {}", locations.output_dir.display());
    Ok(())
}

/// Files and directories after applying flags over discovered defaults.
struct Locations {
    config_file: PathBuf,
    state_file: PathBuf,
    keyframe_file: PathBuf,
    output_dir: PathBuf,
}

impl Locations {
    fn resolve(args: &RunArgs, paths: &AppPaths) -> Self {
        Self {
            config_file: args.config.clone().unwrap_or_else(|| paths.config_file()),
            state_file: args.state_file.clone().unwrap_or_else(|| paths.state_file()),
            keyframe_file: args
                .keyframe_file
                .clone()
                .unwrap_or_else(|| paths.keyframe_file()),
            output_dir: args
                .output_dir
                .clone()
                .unwrap_or_else(|| paths.output_dir().to_path_buf()),
        }
    }
}

fn build_config(args: RunArgs, paths: &AppPaths) -> Result<RendererConfig> {
    let (kernel_source, kernel_label) = match &args.kernel {
        Some(path) => {
            let source = fs::read_to_string(path)
                .with_context(|| format!("failed to read kernel at {}", path.display()))?;
            (source, path.display().to_string())
        }
        None => (DEFAULT_KERNEL.to_string(), "built-in scatter kernel".to_string()),
    };

    let locations = Locations::resolve(&args, paths);
    let app_config = AppConfig::load_or_default(&locations.config_file)?;

    Ok(RendererConfig {
        surface_size: args.size,
        kernel_source,
        kernel_label,
        gpu_power: args.gpu_power,
        output_dir: locations.output_dir,
        state_file: locations.state_file,
        keyframe_file: locations.keyframe_file,
        export: app_config.export,
    })
}
