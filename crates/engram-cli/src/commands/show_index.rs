use anyhow::{Context, Result};
use clap::Args;

use crate::output::{format, OutputFormat};

#[derive(Args)]
pub struct ShowIndexArgs {
    /// Fetch the engram index from the remote first
    #[arg(long)]
    pub fetch: bool,

    /// Shorthand for --format json
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: &ShowIndexArgs, fmt: OutputFormat) -> Result<()> {
    let fmt = if args.json { OutputFormat::Json } else { fmt };
    let manager = super::load_manager(None)?;
    let listing = manager
        .list_index(args.fetch)
        .context("Failed to read engram index")?;
    if let Some(err) = &listing.fetch_error {
        eprintln!("warning: fetch failed, showing local index: {err}");
    }
    println!("{}", format::format_index_listing(&listing, fmt));
    Ok(())
}
