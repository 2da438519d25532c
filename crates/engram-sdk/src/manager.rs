use std::fs;
use std::path::{Path, PathBuf};

use engram_cache::RepoCache;
use engram_core::config::{project_engrams_dir, Settings, ENGRAMS_DIR};
use engram_core::storage::{index_exists, IndexStore};
use engram_discovery::{discover_engrams, discover_engrams_with_lazy, Engram, EngramPaths};
use engram_protocol::{configure_auto_fetch, fetch_index, push_index, FetchResult, PushResult};
use git2::Repository;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::SdkError;

/// Entry point for operating on engrams: the user's settings, the mirror
/// cache, and (optionally) the project being worked on.
#[derive(Debug, Clone)]
pub struct EngramManager {
    pub(crate) settings: Settings,
    pub(crate) cache: RepoCache,
    pub(crate) project_root: Option<PathBuf>,
}

/// What [`EngramManager::init_project`] did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InitReport {
    pub engrams_dir: PathBuf,
    pub created_dir: bool,
    /// Remotes that gained the engram refspecs.
    pub configured_remotes: Vec<String>,
    pub fetched_index: bool,
}

impl EngramManager {
    pub fn new(settings: Settings, project_root: Option<PathBuf>) -> Self {
        Self {
            cache: RepoCache::from_settings(&settings),
            settings,
            project_root,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cache(&self) -> &RepoCache {
        &self.cache
    }

    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    pub(crate) fn require_project(&self) -> Result<&Path, SdkError> {
        self.project_root.as_deref().ok_or(SdkError::NotInProject)
    }

    /// `<project>/.engrams`
    pub fn engrams_dir(&self) -> Result<PathBuf, SdkError> {
        Ok(project_engrams_dir(self.require_project()?))
    }

    /// `.engrams/<name>` relative to the project root.
    pub(crate) fn relative_engram_path(name: &str) -> PathBuf {
        Path::new(ENGRAMS_DIR).join(name)
    }

    pub fn paths(&self) -> EngramPaths {
        EngramPaths {
            global: self.settings.global_dir.clone(),
            local: self.project_root.as_deref().map(project_engrams_dir),
            project_root: self.project_root.clone(),
        }
    }

    /// Every engram the host should know about, lazy ones included.
    pub fn list_modules(&self) -> Result<Vec<Engram>, SdkError> {
        let paths = self.paths();
        let engrams = match &self.project_root {
            Some(root) => discover_engrams_with_lazy(&paths, root)?,
            None => discover_engrams(&paths)?,
        };
        Ok(engrams)
    }

    pub(crate) fn open_repo(&self) -> Result<Repository, SdkError> {
        Ok(Repository::open(self.require_project()?)?)
    }

    pub(crate) fn index_store(&self) -> Result<IndexStore, SdkError> {
        Ok(IndexStore::from_repo(self.open_repo()?))
    }

    /// Fetch the index from the configured remote.
    pub fn fetch_index(&self) -> Result<FetchResult, SdkError> {
        let repo = self.open_repo()?;
        Ok(fetch_index(&repo, &self.settings.remote)?)
    }

    /// Push the local index to the configured remote.
    pub fn push_index(&self) -> Result<PushResult, SdkError> {
        let repo = self.open_repo()?;
        Ok(push_index(&repo, &self.settings.remote)?)
    }

    /// Prepare the project: create `.engrams/`, make every remote carry the
    /// engram refs, and pull down an existing index if there is none locally.
    /// Network problems are logged, not returned.
    pub fn init_project(&self) -> Result<InitReport, SdkError> {
        let root = self.require_project()?;
        let engrams_dir = project_engrams_dir(root);
        let mut report = InitReport {
            created_dir: !engrams_dir.is_dir(),
            engrams_dir,
            ..Default::default()
        };
        if report.created_dir {
            fs::create_dir_all(&report.engrams_dir)?;
            info!(dir = %report.engrams_dir.display(), "Created engrams directory");
        }

        let repo = match Repository::open(root) {
            Ok(repo) => repo,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(report),
            Err(e) => return Err(e.into()),
        };
        report.configured_remotes = configure_auto_fetch(&repo)?;

        if !index_exists(root) && repo.find_remote(&self.settings.remote).is_ok() {
            match fetch_index(&repo, &self.settings.remote) {
                Ok(result) => report.fetched_index = result.tip.is_some(),
                Err(e) => warn!(error = %e, "Could not fetch engram index"),
            }
        }
        Ok(report)
    }
}
