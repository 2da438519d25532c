use engram_core::config::is_valid_engram_name;
use engram_core::model::IndexEntry;
use engram_core::storage::read_index;
use serde::Serialize;
use tracing::warn;

use crate::error::SdkError;
use crate::lazy::EngramState;
use crate::manager::EngramManager;

/// One row of [`EngramManager::list_index`].
#[derive(Debug, Clone, Serialize)]
pub struct IndexListingEntry {
    pub name: String,
    pub state: EngramState,
    pub entry: IndexEntry,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexListing {
    pub entries: Vec<IndexListingEntry>,
    /// Set when `fetch_first` was requested and the fetch failed; the listing
    /// then shows the local index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_error: Option<String>,
}

impl EngramManager {
    /// The project's index with each entry's current state, optionally
    /// fetching from the remote first.
    pub fn list_index(&self, fetch_first: bool) -> Result<IndexListing, SdkError> {
        let root = self.require_project()?;

        let mut fetch_error = None;
        if fetch_first {
            if let Err(e) = self.fetch_index() {
                warn!(error = %e, "Could not fetch engram index");
                fetch_error = Some(e.to_string());
            }
        }

        let index = read_index(root)?.ok_or(SdkError::NoIndex)?;
        let mut entries = Vec::with_capacity(index.len());
        for (name, entry) in index {
            if !is_valid_engram_name(&name) {
                warn!(name = %name, "Ignoring index entry with an unusable name");
                continue;
            }
            let state = self.state_with_entry(&name, Some(entry.clone()))?;
            entries.push(IndexListingEntry { name, state, entry });
        }
        Ok(IndexListing {
            entries,
            fetch_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_core::config::Settings;
    use engram_core::model::{EngramIndex, Manifest};
    use engram_core::storage::write_index;
    use git2::Repository;
    use std::path::Path;
    use tempfile::TempDir;

    const DESC: &str = "This is a sufficiently long description for testing.";

    fn setup() -> (TempDir, EngramManager) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("project");
        Repository::init(&root).unwrap();
        let settings = Settings::with_roots(tmp.path().join("global"), tmp.path().join("cache"));
        let m = EngramManager::new(settings, Some(root));
        (tmp, m)
    }

    #[test]
    fn test_no_index_is_an_error() {
        let (_tmp, m) = setup();
        let err = m.list_index(false).unwrap_err();
        assert!(matches!(err, SdkError::NoIndex));
    }

    #[test]
    fn test_listing_reports_state_and_fetch_failure() {
        let (_tmp, m) = setup();
        let root = m.project_root().unwrap().to_path_buf();
        let manifest = Manifest::parse(
            &format!("name = \"alpha\"\ndescription = \"{DESC}\"\n"),
            Path::new("engram.toml"),
        )
        .unwrap();
        let mut index = EngramIndex::new();
        index.insert("alpha".into(), IndexEntry::new(manifest, "https://example.com/a.git"));
        write_index(&root, &index).unwrap();

        // No "origin" remote: the fetch fails but the listing still works.
        let listing = m.list_index(true).unwrap();
        assert!(listing.fetch_error.is_some());
        assert_eq!(listing.entries.len(), 1);
        assert_eq!(listing.entries[0].name, "alpha");
        assert_eq!(listing.entries[0].state, EngramState::Indexed);

        let json = serde_json::to_value(&listing).unwrap();
        assert_eq!(json["entries"][0]["state"], "indexed");
        assert_eq!(json["entries"][0]["entry"]["url"], "https://example.com/a.git");
    }
}
