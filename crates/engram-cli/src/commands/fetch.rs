use anyhow::{Context, Result};
use clap::Args;

#[derive(Args)]
pub struct FetchArgs {
    /// Remote name (default: engram.remote or origin)
    pub remote: Option<String>,
}

pub fn run(args: &FetchArgs) -> Result<()> {
    let manager = super::load_manager(args.remote.as_deref())?;
    let result = manager
        .fetch_index()
        .context("Failed to fetch engram index")?;

    match result.tip {
        None => eprintln!("{} has no engram index", result.remote),
        Some(tip) if result.updated() => {
            eprintln!("Updated engram index from {} ({tip})", result.remote)
        }
        Some(_) if result.ahead() => eprintln!(
            "Local engram index is ahead of {}, run `engram push`",
            result.remote
        ),
        Some(_) => eprintln!("Engram index is up to date with {}", result.remote),
    }
    Ok(())
}
