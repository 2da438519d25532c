use anyhow::{Context, Result};
use clap::Args;
use engram_sdk::Engram;

use crate::output::OutputFormat;

#[derive(Args)]
pub struct ListArgs {
    /// Only engrams in the global directory
    #[arg(short, long, conflicts_with = "local")]
    pub global: bool,

    /// Only engrams in this project
    #[arg(short, long)]
    pub local: bool,
}

pub fn run(args: &ListArgs, fmt: OutputFormat) -> Result<()> {
    let manager = super::load_manager(None)?;
    let paths = manager.paths();
    let engrams = manager
        .list_modules()
        .context("Failed to discover engrams")?;

    let selected: Vec<&Engram> = engrams
        .iter()
        .filter(|e| {
            let global = e.directory.starts_with(&paths.global);
            if args.global {
                global
            } else if args.local {
                !global
            } else {
                true
            }
        })
        .collect();

    match fmt {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&selected).unwrap_or_default()
            );
        }
        OutputFormat::Text => {
            if selected.is_empty() {
                println!("No engrams found.");
                return Ok(());
            }
            for e in selected {
                let marker = if e.is_lazy { "\u{25cb}" } else { "\u{2713}" };
                println!("{marker} {} ({})", e.name, e.tool_name);
                println!("    {}", e.directory.display());
            }
        }
    }
    Ok(())
}
