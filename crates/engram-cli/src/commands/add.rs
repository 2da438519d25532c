use anyhow::{bail, Context, Result};
use clap::Args;
use engram_sdk::{parse_repo_ref, supported_aliases, AddRequest, Scope};

use crate::output::{format, OutputFormat};

#[derive(Args)]
pub struct AddArgs {
    /// Repository: owner/repo, an alias like gh:owner/repo, or a git URL
    pub repo: String,

    /// Directory name under .engrams/ (default: the repository name)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Install into the global engrams directory instead of the project
    #[arg(short, long)]
    pub global: bool,

    /// Make a standalone clone instead of a submodule
    #[arg(short, long)]
    pub clone: bool,

    /// Replace an existing engram at the target path
    #[arg(short, long)]
    pub force: bool,

    /// Talk to the remote directly instead of going through the mirror cache
    #[arg(long)]
    pub no_cache: bool,
}

pub fn run(args: &AddArgs, fmt: OutputFormat) -> Result<()> {
    let Some(repo) = parse_repo_ref(&args.repo) else {
        bail!(
            "Invalid repository reference '{}'. Use owner/repo, a URL, or one of: {}",
            args.repo,
            supported_aliases().join(", ")
        );
    };

    let mut request = AddRequest::new(repo);
    request
        .scope(if args.global {
            Scope::Global
        } else {
            Scope::Project
        })
        .clone_instead(args.clone)
        .force(args.force)
        .use_cache(!args.no_cache);
    if let Some(name) = &args.name {
        request.name(name);
    }

    let manager = super::load_manager(None)?;
    let outcome = manager
        .add(&request)
        .with_context(|| format!("Failed to add {}", args.repo))?;
    println!("{}", format::format_add_outcome(&outcome, fmt));
    Ok(())
}
