use std::path::{Path, PathBuf};

use engram_core::config::{find_project_root, project_engrams_dir, Settings};

/// Where to look for engrams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngramPaths {
    /// User-level engrams, shared by every project.
    pub global: PathBuf,
    /// `<project>/.engrams`, if `cwd` is inside a project.
    pub local: Option<PathBuf>,
    pub project_root: Option<PathBuf>,
}

impl EngramPaths {
    /// Search roots in precedence order: later roots override earlier ones.
    pub fn roots(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.global.as_path()).chain(self.local.as_deref())
    }
}

pub fn get_default_engram_paths(cwd: &Path, settings: &Settings) -> EngramPaths {
    let project_root = find_project_root(cwd);
    EngramPaths {
        global: settings.global_dir.clone(),
        local: project_root.as_deref().map(project_engrams_dir),
        project_root,
    }
}
