use anyhow::{Context, Result};
use clap::Args;

#[derive(Args)]
pub struct PushArgs {
    /// Remote name (default: engram.remote or origin)
    pub remote: Option<String>,
}

pub fn run(args: &PushArgs) -> Result<()> {
    let manager = super::load_manager(args.remote.as_deref())?;
    let result = manager
        .push_index()
        .context("Failed to push engram index")?;
    eprintln!("Pushed engram index to {} ({})", result.remote, result.tip);
    Ok(())
}
