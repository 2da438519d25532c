use std::path::Path;

use git2::{ErrorCode, Oid, Repository};
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{EngramIndex, IndexEntry};

use super::objects::create_index_commit;
use super::read::read_index_commit;
use super::refs;

/// Attempts made by [`IndexStore::update`] before giving up on a contended ref.
const MAX_UPDATE_ATTEMPTS: usize = 5;

/// An index document together with the commit it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSnapshot {
    pub index: EngramIndex,
    pub tip: Oid,
}

/// Reads and writes the engram index stored at `refs/engrams/index`.
///
/// Every write creates a new commit whose parent is the previous tip and moves
/// the ref with compare-and-swap, so history is append-only and a racing
/// writer fails instead of overwriting.
pub struct IndexStore {
    repo: Repository,
}

impl IndexStore {
    /// Open the Git repository at the given path.
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        let repo = Repository::open(path)?;
        Ok(Self { repo })
    }

    /// Discover the Git repository containing `path`.
    pub fn discover(path: &Path) -> Result<Self, CoreError> {
        let repo = Repository::discover(path)?;
        Ok(Self { repo })
    }

    pub fn from_repo(repo: Repository) -> Self {
        Self { repo }
    }

    /// Get the underlying git2::Repository reference.
    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    /// Existence check; never fetches.
    pub fn exists(&self) -> bool {
        matches!(refs::index_tip(&self.repo), Ok(Some(_)))
    }

    /// Current index with the tip it was read from.
    pub fn snapshot(&self) -> Result<Option<IndexSnapshot>, CoreError> {
        let Some(tip) = refs::index_tip(&self.repo)? else {
            return Ok(None);
        };
        let index = read_index_commit(&self.repo, tip)?;
        Ok(Some(IndexSnapshot { index, tip }))
    }

    /// Current index, or `None` if the ref does not exist.
    pub fn read(&self) -> Result<Option<EngramIndex>, CoreError> {
        Ok(self.snapshot()?.map(|s| s.index))
    }

    /// Write `index` on top of whatever the tip is right now.
    pub fn write(&self, index: &EngramIndex) -> Result<Oid, CoreError> {
        let tip = refs::index_tip(&self.repo)?;
        self.write_if(index, tip)
    }

    /// Write `index` only if the tip is still `expected`.
    pub fn write_if(&self, index: &EngramIndex, expected: Option<Oid>) -> Result<Oid, CoreError> {
        let commit = create_index_commit(&self.repo, index, expected)?;
        refs::update_index_ref(&self.repo, commit, expected)?;
        debug!(tip = %commit, entries = index.len(), "Wrote engram index");
        Ok(commit)
    }

    /// Read-modify-write with retry: `apply` is re-run against a fresh read
    /// whenever another writer got there first. Returns the written index.
    pub fn update<F>(&self, mut apply: F) -> Result<EngramIndex, CoreError>
    where
        F: FnMut(&mut EngramIndex),
    {
        let mut last_err = None;
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let (mut index, tip) = match self.snapshot()? {
                Some(s) => (s.index, Some(s.tip)),
                None => (EngramIndex::new(), None),
            };
            apply(&mut index);
            match self.write_if(&index, tip) {
                Ok(_) => return Ok(index),
                Err(e @ CoreError::IndexConflict { .. }) => {
                    warn!(attempt, "Engram index changed underneath us, retrying");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| CoreError::InvalidIndex("update failed".into())))
    }

    /// Insert or replace a single entry.
    pub fn upsert(&self, name: &str, entry: IndexEntry) -> Result<EngramIndex, CoreError> {
        self.update(|index| {
            let mut entry = entry.clone();
            if let Some(previous) = index.get(name) {
                entry.inherit_lock(previous);
            }
            index.insert(name.to_string(), entry);
        })
    }

    /// Explicitly remove an entry. Returns whether it existed.
    pub fn remove(&self, name: &str) -> Result<bool, CoreError> {
        let mut existed = false;
        self.update(|index| existed = index.remove(name).is_some())?;
        Ok(existed)
    }
}

/// Index at the project root, or `None` if the ref (or the repository) does
/// not exist.
pub fn read_index(project_root: &Path) -> Result<Option<EngramIndex>, CoreError> {
    match Repository::open(project_root) {
        Ok(repo) => IndexStore::from_repo(repo).read(),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Commit `index` as the new target of the index ref.
pub fn write_index(project_root: &Path, index: &EngramIndex) -> Result<Oid, CoreError> {
    IndexStore::open(project_root)?.write(index)
}

pub fn index_exists(project_root: &Path) -> bool {
    IndexStore::open(project_root)
        .map(|s| s.exists())
        .unwrap_or(false)
}

/// Seed an index entry from a freshly added engram's manifest.
pub fn parse_engram_toml(path: &Path) -> Result<IndexEntry, CoreError> {
    IndexEntry::from_manifest_path(path)
}
