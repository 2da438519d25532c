use std::ffi::OsStr;

use anyhow::{bail, Context, Result};
use clap::Args;
use engram_sdk::{render_tree, FileTreeOptions};

#[derive(Args)]
pub struct TreeArgs {
    /// Engram name, tool name or directory name
    pub name: String,

    /// Annotate entries with their oneliner descriptions
    #[arg(short, long)]
    pub metadata: bool,

    /// Deepest level to list
    #[arg(long)]
    pub max_depth: Option<usize>,
}

pub fn run(args: &TreeArgs) -> Result<()> {
    let manager = super::load_manager(None)?;
    let engrams = manager
        .list_modules()
        .context("Failed to discover engrams")?;

    let Some(engram) = engrams.iter().find(|e| {
        e.name == args.name
            || e.tool_name == args.name
            || e.directory.file_name() == Some(OsStr::new(&args.name))
    }) else {
        bail!("No engram named '{}'", args.name);
    };

    let opts = FileTreeOptions {
        include_metadata: args.metadata,
        max_depth: args.max_depth,
    };
    let tree = render_tree(&engram.directory, &opts);
    if tree.is_empty() {
        if engram.is_lazy {
            eprintln!(
                "{} is not initialized, run `engram lazy-init {}`",
                engram.name, args.name
            );
        }
        return Ok(());
    }
    println!("{tree}");
    Ok(())
}
