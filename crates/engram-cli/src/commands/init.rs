use anyhow::{Context, Result};
use clap::Args;

use crate::output::{format, OutputFormat};

#[derive(Args)]
pub struct InitArgs {
    /// Remote that carries the engram index (default: engram.remote or origin)
    #[arg(long)]
    pub remote: Option<String>,
}

pub fn run(args: &InitArgs, fmt: OutputFormat) -> Result<()> {
    let manager = super::load_manager(args.remote.as_deref())?;
    let report = manager
        .init_project()
        .context("Failed to initialize engrams for this project")?;
    println!("{}", format::format_init_report(&report, fmt));
    Ok(())
}
