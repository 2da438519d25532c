use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::warn;

use crate::output::{format, OutputFormat};

#[derive(Args)]
pub struct LazyInitArgs {
    /// Engram to initialize
    pub name: Option<String>,

    /// Fetch the engram index from the remote first
    #[arg(long)]
    pub fetch: bool,

    /// Initialize every engram in the index
    #[arg(short, long, conflicts_with = "name")]
    pub all: bool,
}

pub fn run(args: &LazyInitArgs, fmt: OutputFormat) -> Result<()> {
    if args.name.is_none() && !args.all {
        bail!("Name an engram to initialize, or pass --all");
    }

    let manager = super::load_manager(None)?;
    if args.fetch {
        if let Err(e) = manager.fetch_index() {
            warn!(error = %e, "Could not fetch engram index, using local copy");
        }
    }

    match &args.name {
        Some(name) => {
            let outcome = manager
                .initialize_lazy_module(name)
                .with_context(|| format!("Failed to initialize {name}"))?;
            println!("{}", format::format_init_outcome(name, &outcome, fmt));
        }
        None => {
            let report = manager
                .initialize_all_lazy_modules()
                .context("Failed to initialize engrams")?;
            println!("{}", format::format_batch_report(&report, fmt));
            if !report.is_success() {
                bail!("{} engram(s) failed to initialize", report.failed.len());
            }
        }
    }
    Ok(())
}
