use std::path::PathBuf;

use clap::{Parser, Subcommand};
use renderer::GpuPowerPreference;

#[derive(Parser, Debug)]
#[command(
    name = "scatterlight",
    author,
    version,
    about = "Progressive GPU-compute renderer with offline capture",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// WGSL kernel file; the built-in scatter kernel is used when omitted.
    #[arg(value_name = "KERNEL")]
    pub kernel: Option<PathBuf>,

    /// Initial window size (e.g. `1280x720`).
    #[arg(
        long,
        value_name = "WIDTHxHEIGHT",
        value_parser = parse_surface_size,
        default_value = "1280x720"
    )]
    pub size: (u32, u32),

    /// Configuration file with `[export.*]` overrides.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory for screenshots, gifs and videos.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Saved camera record.
    #[arg(long, value_name = "FILE")]
    pub state_file: Option<PathBuf>,

    /// Saved keyframe path.
    #[arg(long, value_name = "FILE")]
    pub keyframe_file: Option<PathBuf>,

    /// Adapter preference: `low` or `high`.
    #[arg(
        long,
        value_name = "POWER",
        value_parser = parse_gpu_power,
        default_value = "high"
    )]
    pub gpu_power: GpuPowerPreference,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Render one screenshot of the saved camera without opening a window.
    Capture,
    /// Render the saved keyframe path as a fly-through without opening a window.
    Video,
    /// Print resolved config, data and output locations.
    Where,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_surface_size(spec: &str) -> Result<(u32, u32), String> {
    let trimmed = spec.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| "expected WxH format, e.g. 1280x720".to_string())?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| "invalid width in size specification".to_string())?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| "invalid height in size specification".to_string())?;

    if width == 0 || height == 0 {
        return Err("surface dimensions must be greater than zero".to_string());
    }
    Ok((width, height))
}

pub fn parse_gpu_power(value: &str) -> Result<GpuPowerPreference, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "low" | "low-power" => Ok(GpuPowerPreference::Low),
        "high" | "high-performance" => Ok(GpuPowerPreference::High),
        other => Err(format!("unknown GPU power preference '{other}' (expected low or high)")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_surface_sizes() {
        assert_eq!(parse_surface_size("1920x1080"), Ok((1920, 1080)));
        assert_eq!(parse_surface_size(" 800 X 600 "), Ok((800, 600)));
        assert!(parse_surface_size("800").is_err());
        assert!(parse_surface_size("0x600").is_err());
        assert!(parse_surface_size("axb").is_err());
    }

    #[test]
    fn parses_gpu_power() {
        assert_eq!(parse_gpu_power("LOW"), Ok(GpuPowerPreference::Low));
        assert_eq!(parse_gpu_power("high"), Ok(GpuPowerPreference::High));
        assert!(parse_gpu_power("medium").is_err());
    }

    #[test]
    fn subcommands_share_run_flags() {
        let cli = Cli::try_parse_from([
            "scatterlight",
            "--size",
            "640x360",
            "--output-dir",
            "/tmp/out",
            "capture",
        ])
        .unwrap();
        assert_eq!(cli.command, Some(Command::Capture));
        assert_eq!(cli.run.size, (640, 360));
        assert_eq!(cli.run.output_dir, Some(PathBuf::from("/tmp/out")));
        assert_eq!(cli.run.gpu_power, GpuPowerPreference::High);
        assert!(cli.run.kernel.is_none());
    }
}
