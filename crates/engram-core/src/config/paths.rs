use std::path::{Component, Path, PathBuf};

/// Project-local directory holding one subdirectory per engram.
pub const ENGRAMS_DIR: &str = ".engrams";

/// Manifest file that marks a directory as an engram.
pub const MANIFEST_FILENAME: &str = "engram.toml";

/// Body text handed to the host when an engram is activated.
pub const README_FILENAME: &str = "README.md";

/// Subdirectory of a wrap engram that receives the sparse checkout.
pub const CONTENT_DIR: &str = "content";

/// Walk up from `start` to the first directory that looks like a project root
/// (contains `.git` or `.engrams`).
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists() || dir.join(ENGRAMS_DIR).exists())
        .map(Path::to_path_buf)
}

/// `<project_root>/.engrams`
pub fn project_engrams_dir(project_root: &Path) -> PathBuf {
    project_root.join(ENGRAMS_DIR)
}

/// An engram name (or index key) is used as a directory name under an
/// engrams root, so it must be exactly one plain path component.
pub fn is_valid_engram_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}
