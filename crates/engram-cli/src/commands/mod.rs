pub mod add;
pub mod fetch;
pub mod init;
pub mod lazy_init;
pub mod list;
pub mod push;
pub mod show_index;
pub mod tree;

use anyhow::{Context, Result};
use clap::Subcommand;
use engram_sdk::{find_project_root, EngramManager, Settings};

#[derive(Subcommand)]
pub enum Commands {
    /// Prepare the current project: create .engrams/ and configure engram refspecs
    Init(init::InitArgs),
    /// Add an engram from a repository (submodule in the project, or a global clone)
    Add(add::AddArgs),
    /// Check out engrams that are only known from the index
    LazyInit(lazy_init::LazyInitArgs),
    /// Show the project's engram index and what is initialized
    ShowIndex(show_index::ShowIndexArgs),
    /// List engram directories on disk
    List(list::ListArgs),
    /// Print the file tree of an engram
    Tree(tree::TreeArgs),
    /// Fetch the engram index from a remote
    Fetch(fetch::FetchArgs),
    /// Push the engram index to a remote
    Push(push::PushArgs),
}

/// Manager for the current directory's project (if any), with the user's
/// settings and an optional remote override.
pub fn load_manager(remote: Option<&str>) -> Result<EngramManager> {
    let mut settings = Settings::load().context("Failed to load engram settings")?;
    if let Some(remote) = remote {
        settings.remote = remote.to_string();
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(EngramManager::new(settings, find_project_root(&cwd)))
}
