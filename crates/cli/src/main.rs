//! formula-lint - checks quest template directories before deployment

use clap::Parser;
use qreward_cli::Cli;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let clean = qreward_cli::run(&cli)?;

    Ok(if clean { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
