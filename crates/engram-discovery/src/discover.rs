use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use engram_core::config::{is_valid_engram_name, project_engrams_dir, MANIFEST_FILENAME};
use engram_core::model::{EngramIndex, IndexEntry};
use engram_core::storage::read_index;
use tracing::{debug, warn};

use crate::engram::{parse_engram, Engram};
use crate::error::DiscoveryError;
use crate::paths::EngramPaths;
use crate::tool_name::generate_tool_name;

/// Manifest files of every engram directory under the search roots.
pub fn find_engram_files(paths: &EngramPaths) -> Result<Vec<PathBuf>, DiscoveryError> {
    let mut files = Vec::new();
    for root in paths.roots() {
        for dir in subdirectories(root)? {
            let manifest = dir.join(MANIFEST_FILENAME);
            if manifest.is_file() {
                files.push(manifest);
            }
        }
    }
    Ok(files)
}

/// Engrams on disk. A project-local engram replaces a global one of the same
/// name.
pub fn discover_engrams(paths: &EngramPaths) -> Result<Vec<Engram>, DiscoveryError> {
    let mut engrams = scan_roots(paths)?;
    assign_tool_names(&mut engrams);
    Ok(engrams)
}

/// [`discover_engrams`] plus a lazy record for every index entry that is not
/// on disk. Entries without a remote are left out: they could never be
/// materialized.
pub fn discover_engrams_with_lazy(
    paths: &EngramPaths,
    project_root: &Path,
) -> Result<Vec<Engram>, DiscoveryError> {
    let mut engrams = scan_roots(paths)?;

    let local_dir = paths
        .local
        .clone()
        .unwrap_or_else(|| project_engrams_dir(project_root));
    let on_disk: HashSet<String> = engrams
        .iter()
        .flat_map(|e| {
            let dir_name = e
                .directory
                .file_name()
                .map(|n| n.to_string_lossy().into_owned());
            std::iter::once(e.name.clone()).chain(dir_name)
        })
        .collect();

    for (key, entry) in get_engrams_from_index(project_root)? {
        if !is_valid_engram_name(&key) {
            warn!(name = %key, "Index entry name is not a plain directory name, skipping");
            continue;
        }
        if on_disk.contains(&key) {
            continue;
        }
        if !entry.is_reachable() {
            debug!(name = %key, "Index entry has no remote, skipping");
            continue;
        }
        let directory = local_dir.join(&key);
        engrams.push(Engram::from_index_entry(&key, &entry, directory)?);
    }

    assign_tool_names(&mut engrams);
    Ok(engrams)
}

/// The index at `project_root`, or `None` if there is none (or no repository).
pub fn read_index_ref(project_root: &Path) -> Result<Option<EngramIndex>, DiscoveryError> {
    Ok(read_index(project_root)?)
}

/// Raw index entries, unmerged with disk state, ordered by name.
pub fn get_engrams_from_index(
    project_root: &Path,
) -> Result<Vec<(String, IndexEntry)>, DiscoveryError> {
    Ok(read_index_ref(project_root)?
        .map(|index| index.into_iter().collect())
        .unwrap_or_default())
}

fn scan_roots(paths: &EngramPaths) -> Result<Vec<Engram>, DiscoveryError> {
    let mut engrams: Vec<Engram> = Vec::new();
    for root in paths.roots() {
        for dir in subdirectories(root)? {
            let Some(engram) = parse_engram(&dir)? else {
                continue;
            };
            match engrams.iter_mut().find(|e| e.name == engram.name) {
                Some(existing) => {
                    debug!(name = %engram.name, dir = %dir.display(), "Overriding engram");
                    *existing = engram;
                }
                None => engrams.push(engram),
            }
        }
    }
    Ok(engrams)
}

fn assign_tool_names(engrams: &mut [Engram]) {
    let mut taken = HashSet::new();
    for engram in engrams {
        engram.tool_name = generate_tool_name(&engram.name, &engram.directory, &mut taken);
    }
}

/// Immediate subdirectories, sorted. A missing root has none.
fn subdirectories(root: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut dirs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}
