mod cli;
mod config;
mod paths;
mod run;

use anyhow::Result;
use renderer::HeadlessExport;

use crate::cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        None => run::run(cli.run),
        Some(Command::Capture) => run::run_headless(cli.run, HeadlessExport::Screenshot),
        Some(Command::Video) => run::run_headless(cli.run, HeadlessExport::Video),
        Some(Command::Where) => run::print_paths(&cli.run),
    }
}
