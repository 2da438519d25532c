use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};

use engram_cache::git::{run_git, run_git_in};
use engram_cache::{CacheError, SubmoduleAddOptions};
use engram_core::config::{is_valid_engram_name, MANIFEST_FILENAME};
use engram_core::storage::parse_engram_toml;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::SdkError;
use crate::manager::EngramManager;
use crate::repo_ref::{engram_name_for, RepoRef};

/// Where an added engram goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// `<project>/.engrams/<name>`
    #[default]
    Project,
    /// `<global dir>/<name>`
    Global,
}

/// A fluent description of one `add`.
///
/// # Example
/// ```no_run
/// use engram_core::config::Settings;
/// use engram_sdk::{parse_repo_ref, AddRequest, EngramManager};
///
/// let settings = Settings::load().unwrap();
/// let manager = EngramManager::new(settings, Some("/work/project".into()));
/// let repo = parse_repo_ref("gh:acme/eg.deploy").unwrap();
/// let outcome = manager.add(AddRequest::new(repo).name("deploy").force(true)).unwrap();
/// println!("Added {} at {}", outcome.name, outcome.target.display());
/// ```
#[derive(Debug, Clone)]
pub struct AddRequest {
    repo: RepoRef,
    name: Option<String>,
    scope: Scope,
    clone: bool,
    force: bool,
    use_cache: bool,
}

impl AddRequest {
    pub fn new(repo: RepoRef) -> Self {
        Self {
            repo,
            name: None,
            scope: Scope::Project,
            clone: false,
            force: false,
            use_cache: true,
        }
    }

    /// Install under this name instead of the repository name.
    pub fn name(&mut self, name: &str) -> &mut Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn scope(&mut self, scope: Scope) -> &mut Self {
        self.scope = scope;
        self
    }

    /// Plain clone instead of a submodule (always the case for global scope).
    pub fn clone_instead(&mut self, clone: bool) -> &mut Self {
        self.clone = clone;
        self
    }

    /// Remove whatever is at the target first.
    pub fn force(&mut self, force: bool) -> &mut Self {
        self.force = force;
        self
    }

    /// Go straight to the remote, bypassing the mirror cache.
    pub fn use_cache(&mut self, use_cache: bool) -> &mut Self {
        self.use_cache = use_cache;
        self
    }

    pub fn engram_name(&self) -> &str {
        self.name
            .as_deref()
            .unwrap_or_else(|| engram_name_for(&self.repo.repo))
    }
}

/// Result of a successful add.
#[derive(Debug, Clone, Serialize)]
pub struct AddOutcome {
    pub name: String,
    pub target: PathBuf,
    pub as_submodule: bool,
    /// The mirror already existed before this add.
    pub cache_hit: bool,
    pub index_updated: bool,
}

impl EngramManager {
    /// Install an engram. In project scope it becomes a submodule at
    /// `.engrams/<name>` and its manifest is recorded in the index; otherwise
    /// it is a standalone clone.
    pub fn add(&self, request: &AddRequest) -> Result<AddOutcome, SdkError> {
        let name = request.engram_name().to_string();
        validate_name(&name)?;
        let url = request.repo.url.as_str();

        let target = match request.scope {
            Scope::Global => self.settings.global_dir.join(&name),
            Scope::Project => self.engrams_dir()?.join(&name),
        };
        let project_root = match request.scope {
            Scope::Project => Some(self.require_project()?),
            Scope::Global => None,
        };

        if request.force {
            if let Some(root) = project_root {
                force_cleanup(root, &target)?;
            } else {
                remove_dir_if_exists(&target)?;
            }
        }
        if target.exists() {
            return Err(SdkError::TargetExists(target));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let cache_hit = request.use_cache && self.cache.is_cached(url);
        info!(
            repo = %format!("{}/{}", request.repo.owner, request.repo.repo),
            name = %name,
            cache_hit,
            "Adding engram"
        );

        let mut outcome = AddOutcome {
            name,
            target,
            as_submodule: false,
            cache_hit,
            index_updated: false,
        };

        match project_root {
            Some(root) if !request.clone => {
                let rel = Self::relative_engram_path(&outcome.name);
                if request.use_cache {
                    let opts = SubmoduleAddOptions {
                        force: request.force,
                        skip_fetch: false,
                    };
                    self.cache.submodule_add_from_cache(url, &rel, root, &opts)?;
                } else {
                    submodule_add_direct(root, url, &rel, request.force)?;
                }
                outcome.as_submodule = true;
                outcome.index_updated = self.record_in_index(&outcome.name, &outcome.target, url)?;
            }
            _ => {
                if request.use_cache {
                    self.cache.clone_from_cache(url, &outcome.target)?;
                } else {
                    clone_direct(url, &outcome.target)?;
                }
            }
        }

        Ok(outcome)
    }

    /// Seed the index with a freshly added engram's own manifest. Returns
    /// false if there is no usable manifest.
    fn record_in_index(&self, name: &str, dir: &Path, url: &str) -> Result<bool, SdkError> {
        let manifest = dir.join(MANIFEST_FILENAME);
        if !manifest.is_file() {
            info!(name, "No {MANIFEST_FILENAME} found, skipping index update");
            return Ok(false);
        }
        let mut entry = match parse_engram_toml(&manifest) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(name, error = %e, "Could not parse {MANIFEST_FILENAME}, skipping index update");
                return Ok(false);
            }
        };
        entry.url = Some(url.to_string());
        self.index_store()?.upsert(name, entry)?;
        info!(name, "Updated engram index");
        Ok(true)
    }
}

pub(crate) fn validate_name(name: &str) -> Result<(), SdkError> {
    if is_valid_engram_name(name) {
        Ok(())
    } else {
        Err(SdkError::InvalidName(name.to_string()))
    }
}

/// Undo any previous submodule at `target` so it can be added again:
/// deinit, unstage, drop `.git/modules/<path>` and the directory itself.
fn force_cleanup(root: &Path, target: &Path) -> Result<(), SdkError> {
    let escape = || SdkError::PathEscape {
        path: target.to_path_buf(),
        root: root.to_path_buf(),
    };
    let rel = target.strip_prefix(root).map_err(|_| escape())?;
    if rel.as_os_str().is_empty() || rel.components().any(|c| !matches!(c, Component::Normal(_))) {
        return Err(escape());
    }
    info!(path = %rel.display(), "Force removing existing engram");

    let tolerate = |step: &str, result: Result<String, CacheError>| {
        if let Err(CacheError::Git { stderr, .. }) = result {
            if !stderr.contains("did not match any file") {
                warn!(step, %stderr, "Cleanup step failed");
            }
        }
    };
    tolerate(
        "submodule deinit",
        run_git_in(root, [OsString::from("submodule"), "deinit".into(), "-f".into(), "--".into(), rel.into()]),
    );
    tolerate(
        "rm",
        run_git_in(root, [OsString::from("rm"), "-f".into(), "-q".into(), "--".into(), rel.into()]),
    );

    let git_dir = resolve_git_dir(root);
    let modules = git_dir.join("modules").join(rel);
    if modules.exists() {
        let real_git_dir = git_dir.canonicalize()?;
        if !modules.canonicalize()?.starts_with(&real_git_dir) {
            return Err(SdkError::PathEscape {
                path: modules,
                root: git_dir,
            });
        }
        fs::remove_dir_all(&modules)?;
    }
    remove_dir_if_exists(target)?;
    Ok(())
}

/// `.git` is a directory, or a `gitdir: <path>` file in worktrees and
/// submodules.
fn resolve_git_dir(root: &Path) -> PathBuf {
    let dot_git = root.join(".git");
    if !dot_git.is_file() {
        return dot_git;
    }
    fs::read_to_string(&dot_git)
        .ok()
        .and_then(|text| {
            text.trim()
                .strip_prefix("gitdir:")
                .map(|p| root.join(p.trim()))
        })
        .unwrap_or(dot_git)
}

fn remove_dir_if_exists(path: &Path) -> Result<(), SdkError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn submodule_add_direct(root: &Path, url: &str, rel: &Path, force: bool) -> Result<(), SdkError> {
    let mut args: Vec<OsString> = vec!["submodule".into(), "add".into(), "--quiet".into()];
    if force {
        args.push("--force".into());
    }
    args.extend([url.into(), rel.into()]);
    run_git(Some(root), args).map_err(|e| CacheError::Submodule {
        path: rel.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(())
}

fn clone_direct(url: &str, target: &Path) -> Result<(), SdkError> {
    let result = run_git(
        None,
        [OsString::from("clone"), "--quiet".into(), url.into(), target.into()],
    );
    if let Err(e) = result {
        remove_dir_if_exists(target)?;
        return Err(CacheError::Clone {
            url: url.to_string(),
            reason: e.to_string(),
        }
        .into());
    }
    Ok(())
}
