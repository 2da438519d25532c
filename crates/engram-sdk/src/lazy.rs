use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use engram_cache::{is_submodule_initialized, SparseCheckout};
use engram_core::config::{is_valid_engram_name, CONTENT_DIR, MANIFEST_FILENAME};
use engram_core::model::{IndexEntry, Manifest, WrapConfig};
use engram_core::storage::read_index;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::add::validate_name;
use crate::error::SdkError;
use crate::manager::EngramManager;

/// Where an engram stands in a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngramState {
    /// Neither on disk nor in the index.
    Absent,
    /// Known (index entry or wrap manifest) but content not checked out.
    Indexed,
    /// Content present: submodule checked out, or wrap `content/` populated.
    Initialized,
}

/// Result of initializing one engram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InitOutcome {
    /// Content was fetched now. `commit` is the wrap checkout's resolved commit.
    Initialized { commit: Option<String> },
    /// Nothing to do.
    AlreadyInitialized,
}

/// Result of [`EngramManager::initialize_all_lazy_modules`]. A batch never
/// stops at the first failure.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub initialized: Vec<String>,
    pub failed: Vec<(String, SdkError)>,
    pub skipped: Vec<String>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Everything known about one engram name, read once.
struct Lookup {
    dir: PathBuf,
    rel: PathBuf,
    manifest: Option<Manifest>,
    entry: Option<IndexEntry>,
}

impl Lookup {
    /// Disk manifest's wrap wins over the index's copy of it.
    fn wrap(&self) -> Option<&WrapConfig> {
        self.manifest
            .as_ref()
            .and_then(|m| m.wrap.as_ref())
            .or_else(|| self.entry.as_ref().and_then(IndexEntry::wrap))
    }
}

impl EngramManager {
    pub fn state(&self, name: &str) -> Result<EngramState, SdkError> {
        let index = read_index(self.require_project()?)?;
        self.state_with_entry(name, index.as_ref().and_then(|i| i.get(name)).cloned())
    }

    pub(crate) fn state_with_entry(
        &self,
        name: &str,
        entry: Option<IndexEntry>,
    ) -> Result<EngramState, SdkError> {
        let root = self.require_project()?;
        Ok(state_of(root, &self.lookup(name, entry)?))
    }

    /// Bring one engram from Indexed to Initialized. Wrap engrams get a sparse
    /// checkout into `content/` and their index entry is pinned to the
    /// resolved commit; other engrams have their submodule checked out.
    pub fn initialize_lazy_module(&self, name: &str) -> Result<InitOutcome, SdkError> {
        let root = self.require_project()?;
        let index = read_index(root)?;
        let entry = index.as_ref().and_then(|i| i.get(name)).cloned();
        let lookup = self.lookup(name, entry)?;

        if state_of(root, &lookup) == EngramState::Initialized {
            debug!(name, "Engram already initialized");
            return Ok(InitOutcome::AlreadyInitialized);
        }

        if let Some(wrap) = lookup.wrap() {
            let commit = self.initialize_wrap(name, &lookup, wrap)?;
            return Ok(InitOutcome::Initialized {
                commit: Some(commit),
            });
        }

        let Some(entry) = &lookup.entry else {
            if lookup.dir.exists() || index.is_none() {
                return Err(SdkError::NotLazy(name.to_string()));
            }
            return Err(SdkError::NotInIndex {
                name: name.to_string(),
                available: index.map(|i| i.into_keys().collect()).unwrap_or_default(),
            });
        };
        if !entry.is_reachable() {
            return Err(SdkError::NoRemote(name.to_string()));
        }

        info!(name, "Initializing submodule engram");
        self.cache
            .init_submodule(root, &lookup.rel, entry.url.as_deref())?;
        Ok(InitOutcome::Initialized { commit: None })
    }

    /// Initialize every engram that is Indexed: all index entries plus wrap
    /// engrams on disk without content. Failures are collected per engram.
    pub fn initialize_all_lazy_modules(&self) -> Result<BatchReport, SdkError> {
        let root = self.require_project()?;
        let index = read_index(root)?.unwrap_or_default();

        let mut names: BTreeSet<String> = index.keys().cloned().collect();
        let local = self.engrams_dir()?;
        if let Ok(dirs) = std::fs::read_dir(&local) {
            for dir in dirs.flatten() {
                if dir.path().join(MANIFEST_FILENAME).is_file() {
                    names.insert(dir.file_name().to_string_lossy().into_owned());
                }
            }
        }

        let mut report = BatchReport::default();
        for name in names {
            if !is_valid_engram_name(&name) {
                warn!(name = %name, "Ignoring index entry with an unusable name");
                continue;
            }
            let lookup = match self.lookup(&name, index.get(&name).cloned()) {
                Ok(lookup) => lookup,
                Err(e) => {
                    warn!(name = %name, error = %e, "Skipping unreadable engram");
                    report.failed.push((name, e));
                    continue;
                }
            };
            match state_of(root, &lookup) {
                EngramState::Initialized => {
                    report.skipped.push(name);
                    continue;
                }
                EngramState::Absent => continue,
                EngramState::Indexed => {}
            }
            // Submodule engrams without an index entry are not ours to init.
            if lookup.wrap().is_none() && lookup.entry.is_none() {
                continue;
            }

            match self.initialize_lazy_module(&name) {
                Ok(InitOutcome::Initialized { .. }) => report.initialized.push(name),
                Ok(InitOutcome::AlreadyInitialized) => report.skipped.push(name),
                Err(e) => {
                    warn!(name = %name, error = %e, "Failed to initialize engram");
                    report.failed.push((name, e));
                }
            }
        }

        info!(
            initialized = report.initialized.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "Lazy initialization finished"
        );
        Ok(report)
    }

    /// Index keys come from a shared ref; one that is not a plain directory
    /// name is refused before it touches the filesystem.
    fn lookup(&self, name: &str, entry: Option<IndexEntry>) -> Result<Lookup, SdkError> {
        validate_name(name)?;
        let dir = self.engrams_dir()?.join(name);
        let manifest_path = dir.join(MANIFEST_FILENAME);
        let manifest = if manifest_path.is_file() {
            Some(Manifest::from_path(&manifest_path)?)
        } else {
            None
        };
        Ok(Lookup {
            rel: Self::relative_engram_path(name),
            dir,
            manifest,
            entry,
        })
    }

    fn initialize_wrap(
        &self,
        name: &str,
        lookup: &Lookup,
        wrap: &WrapConfig,
    ) -> Result<String, SdkError> {
        let locked = lookup.entry.as_ref().and_then(IndexEntry::locked_ref);
        let checkout = SparseCheckout {
            git_ref: locked.or(wrap.git_ref.as_deref()).map(String::from),
            sparse: wrap.sparse.clone(),
        };
        info!(
            name,
            remote = %wrap.remote,
            git_ref = ?checkout.git_ref,
            sparse = ?checkout.sparse,
            "Initializing wrapped engram"
        );

        let content = lookup.dir.join(CONTENT_DIR);
        let commit = self
            .cache
            .clone_with_sparse_checkout(&wrap.remote, &content, &checkout)?;

        // Index-only engram: give the directory its manifest so discovery
        // sees it as materialized.
        if let (None, Some(entry)) = (&lookup.manifest, &lookup.entry) {
            let mut manifest = entry.manifest.clone();
            if let Some(wrap) = manifest.wrap.as_mut() {
                wrap.locked = None;
            }
            let manifest_path = lookup.dir.join(MANIFEST_FILENAME);
            std::fs::write(&manifest_path, manifest.to_toml()?)?;
            debug!(name, path = %manifest_path.display(), "Wrote manifest from index");
        }

        self.pin_wrap(name, lookup, wrap, &commit)?;
        Ok(commit)
    }

    /// Record the resolved commit in the index, seeding an entry from the
    /// manifest if the index does not know this engram yet.
    fn pin_wrap(
        &self,
        name: &str,
        lookup: &Lookup,
        wrap: &WrapConfig,
        commit: &str,
    ) -> Result<(), SdkError> {
        let store = match self.index_store() {
            Ok(store) => store,
            Err(e) => {
                debug!(name, error = %e, "No repository to record the lock in");
                return Ok(());
            }
        };
        let seed = lookup
            .entry
            .clone()
            .or_else(|| {
                lookup
                    .manifest
                    .clone()
                    .map(|m| IndexEntry::new(m, wrap.remote.clone()))
            });

        let mut changed = false;
        store.update(|index| {
            changed = false;
            if !index.contains_key(name) {
                let Some(seed) = &seed else { return };
                index.insert(name.to_string(), seed.clone());
            }
            if let Some(entry) = index.get_mut(name) {
                changed = entry.lock_wrap(commit);
            }
        })?;
        if changed {
            info!(name, commit, "Pinned wrap engram");
        }
        Ok(())
    }
}

fn state_of(root: &Path, lookup: &Lookup) -> EngramState {
    if lookup.wrap().is_some() {
        return if lookup.dir.join(CONTENT_DIR).is_dir() {
            EngramState::Initialized
        } else {
            EngramState::Indexed
        };
    }
    if is_submodule_initialized(root, &lookup.rel) || lookup.manifest.is_some() {
        return EngramState::Initialized;
    }
    if lookup.entry.is_some() {
        EngramState::Indexed
    } else {
        EngramState::Absent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bare_remote, engram_remote, git_ready, project, DESC};
    use crate::{AddRequest, RepoRef};
    use engram_cache::git::run_git;
    use engram_core::config::Settings;
    use engram_core::model::EngramIndex;
    use engram_core::storage::{write_index, IndexStore};
    use std::ffi::OsString;
    use std::fs;
    use tempfile::TempDir;

    fn manager(tmp: &Path, root: &Path) -> EngramManager {
        let settings = Settings::with_roots(tmp.join("global"), tmp.join("cache"));
        EngramManager::new(settings, Some(root.to_path_buf()))
    }

    fn wrap_entry(name: &str, remote: &Path) -> IndexEntry {
        let manifest = Manifest::parse(
            &format!(
                "name = \"{name}\"\ndescription = \"{DESC}\"\n\n[wrap]\nremote = \"{}\"\nsparse = [\"docs/\"]\n",
                remote.display()
            ),
            Path::new(MANIFEST_FILENAME),
        )
        .unwrap();
        IndexEntry::new(manifest, remote.to_string_lossy())
    }

    fn docs_remote(tmp: &Path) -> PathBuf {
        bare_remote(
            tmp,
            "docs-source",
            &[("docs/guide.md", "guide\n"), ("src/main.rs", "fn main() {}\n")],
        )
    }

    #[test]
    fn test_wrap_engram_initializes_and_pins() {
        if !git_ready() {
            return;
        }
        let tmp = TempDir::new().unwrap();
        let remote = docs_remote(tmp.path());
        let root = project(tmp.path());
        let mut index = EngramIndex::new();
        index.insert("docs".into(), wrap_entry("docs", &remote));
        write_index(&root, &index).unwrap();
        let m = manager(tmp.path(), &root);

        assert_eq!(m.state("docs").unwrap(), EngramState::Indexed);
        assert_eq!(m.state("nothing").unwrap(), EngramState::Absent);

        let outcome = m.initialize_lazy_module("docs").unwrap();
        let InitOutcome::Initialized { commit: Some(commit) } = outcome.clone() else {
            panic!("unexpected outcome {outcome:?}");
        };
        let content = root.join(".engrams/docs/content");
        assert!(content.join("docs/guide.md").is_file());
        assert!(!content.join("src").exists());
        assert_eq!(m.state("docs").unwrap(), EngramState::Initialized);

        let index = read_index(&root).unwrap().unwrap();
        assert_eq!(index["docs"].locked_ref(), Some(commit.as_str()));

        // Discovery now reports the engram from disk, no longer lazy.
        assert!(root.join(".engrams/docs").join(MANIFEST_FILENAME).is_file());
        let modules = m.list_modules().unwrap();
        let docs: Vec<_> = modules.iter().filter(|e| e.name == "docs").collect();
        assert_eq!(docs.len(), 1);
        assert!(!docs[0].is_lazy);
        assert_eq!(docs[0].directory, root.join(".engrams/docs"));

        assert_eq!(
            m.initialize_lazy_module("docs").unwrap(),
            InitOutcome::AlreadyInitialized
        );
    }

    #[test]
    fn test_wrap_manifest_on_disk_seeds_index() {
        if !git_ready() {
            return;
        }
        let tmp = TempDir::new().unwrap();
        let remote = docs_remote(tmp.path());
        let root = project(tmp.path());
        let dir = root.join(".engrams/handbook");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(MANIFEST_FILENAME),
            format!(
                "name = \"handbook\"\ndescription = \"{DESC}\"\n\n[wrap]\nremote = \"{}\"\nsparse = [\"docs/\"]\n",
                remote.display()
            ),
        )
        .unwrap();
        let m = manager(tmp.path(), &root);

        assert_eq!(m.state("handbook").unwrap(), EngramState::Indexed);
        m.initialize_lazy_module("handbook").unwrap();

        let index = read_index(&root).unwrap().unwrap();
        assert!(index["handbook"].locked_ref().is_some());
        assert_eq!(index["handbook"].url.as_deref(), Some(remote.to_string_lossy().as_ref()));
    }

    #[test]
    fn test_batch_continues_past_unreachable_remote() {
        if !git_ready() {
            return;
        }
        let tmp = TempDir::new().unwrap();
        let remote = docs_remote(tmp.path());
        let root = project(tmp.path());

        let mut index = EngramIndex::new();
        for name in ["a", "b", "c", "d"] {
            index.insert(name.into(), wrap_entry(name, &remote));
        }
        index.insert(
            "broken".into(),
            wrap_entry("broken", &tmp.path().join("missing.git")),
        );
        write_index(&root, &index).unwrap();

        let report = manager(tmp.path(), &root).initialize_all_lazy_modules().unwrap();
        assert_eq!(report.initialized, vec!["a", "b", "c", "d"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "broken");
        assert_eq!(report.failed[0].1.kind(), engram_core::ErrorKind::Remote);
        assert!(!report.is_success());
        assert!(!root.join(".engrams/broken/content").exists());

        let again = manager(tmp.path(), &root).initialize_all_lazy_modules().unwrap();
        assert!(again.initialized.is_empty());
        assert_eq!(again.skipped.len(), 4);
        assert_eq!(again.failed.len(), 1);
    }

    #[test]
    fn test_submodule_engram_initializes_in_fresh_clone() {
        if !git_ready() {
            return;
        }
        let tmp = TempDir::new().unwrap();
        let remote = engram_remote(tmp.path(), "alpha");
        let upstream = project(tmp.path());
        let m = manager(tmp.path(), &upstream);
        m.add(&AddRequest::new(RepoRef {
            owner: "local".into(),
            repo: "alpha".into(),
            url: remote.to_string_lossy().into_owned(),
        }))
        .unwrap();
        engram_cache::git::run_git_in(&upstream, ["commit", "-q", "-m", "add alpha"]).unwrap();

        // A fresh clone has the submodule registered but not checked out,
        // and no index until it is fetched.
        let clone = tmp.path().join("clone");
        run_git(
            None,
            [OsString::from("clone"), "-q".into(), upstream.clone().into(), clone.clone().into()],
        )
        .unwrap();
        let upstream_index = read_index(&upstream).unwrap().unwrap();
        IndexStore::open(&clone).unwrap().write(&upstream_index).unwrap();

        let c = manager(tmp.path(), &clone);
        assert_eq!(c.state("alpha").unwrap(), EngramState::Indexed);
        assert_eq!(
            c.initialize_lazy_module("alpha").unwrap(),
            InitOutcome::Initialized { commit: None }
        );
        assert!(clone.join(".engrams/alpha/README.md").is_file());
        assert_eq!(
            c.initialize_lazy_module("alpha").unwrap(),
            InitOutcome::AlreadyInitialized
        );
    }

    #[test]
    fn test_index_keys_that_escape_are_refused() {
        if !git_ready() {
            return;
        }
        let tmp = TempDir::new().unwrap();
        let remote = docs_remote(tmp.path());
        let root = project(tmp.path());
        let outside = tmp.path().join("outside-project");

        let mut index = EngramIndex::new();
        index.insert("docs".into(), wrap_entry("docs", &remote));
        index.insert("../../escaped".into(), wrap_entry("escaped", &remote));
        index.insert(
            outside.to_string_lossy().into_owned(),
            wrap_entry("outside", &remote),
        );
        write_index(&root, &index).unwrap();
        let m = manager(tmp.path(), &root);

        let err = m.initialize_lazy_module("../../escaped").unwrap_err();
        assert!(matches!(err, SdkError::InvalidName(_)), "{err}");
        let err = m.initialize_lazy_module(&outside.to_string_lossy()).unwrap_err();
        assert!(matches!(err, SdkError::InvalidName(_)), "{err}");

        let report = m.initialize_all_lazy_modules().unwrap();
        assert_eq!(report.initialized, vec!["docs"]);
        assert!(report.failed.is_empty());
        assert!(!outside.exists());
        assert!(!root.join("../../escaped").exists());
        assert!(!tmp.path().join("escaped").exists());

        let listing = m.list_index(false).unwrap();
        let names: Vec<&str> = listing.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["docs"]);
    }

    #[test]
    fn test_unknown_name_lists_available() {
        if !git_ready() {
            return;
        }
        let tmp = TempDir::new().unwrap();
        let root = project(tmp.path());
        let mut index = EngramIndex::new();
        index.insert("docs".into(), wrap_entry("docs", Path::new("/nowhere.git")));
        write_index(&root, &index).unwrap();

        let err = manager(tmp.path(), &root)
            .initialize_lazy_module("nope")
            .unwrap_err();
        match err {
            SdkError::NotInIndex { available, .. } => assert_eq!(available, vec!["docs"]),
            other => panic!("unexpected error: {other}"),
        }
    }
}
