use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::manifest::{Manifest, TriggerConfig, WrapConfig};
use crate::error::CoreError;

/// The full index document: engram name -> entry. Ordered so that the
/// serialized blob is deterministic for identical content.
pub type EngramIndex = BTreeMap<String, IndexEntry>;

/// Metadata for one engram as stored at the index ref: its manifest fields,
/// flattened, plus the remote it was added from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    #[serde(flatten)]
    pub manifest: Manifest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl IndexEntry {
    pub fn new(manifest: Manifest, url: impl Into<String>) -> Self {
        Self {
            manifest,
            url: Some(url.into()),
        }
    }

    /// Adapt an `engram.toml` on disk into an entry without a url.
    pub fn from_manifest_path(path: &Path) -> Result<Self, CoreError> {
        Ok(Self {
            manifest: Manifest::from_path(path)?,
            url: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn description(&self) -> &str {
        &self.manifest.description
    }

    pub fn wrap(&self) -> Option<&WrapConfig> {
        self.manifest.wrap.as_ref()
    }

    pub fn locked_ref(&self) -> Option<&str> {
        self.wrap().and_then(|w| w.locked.as_deref())
    }

    pub fn disclosure_triggers(&self) -> Option<&TriggerConfig> {
        self.manifest.disclosure_triggers.as_ref()
    }

    pub fn activation_triggers(&self) -> Option<&TriggerConfig> {
        self.manifest.activation_triggers.as_ref()
    }

    /// Entries without a remote cannot be lazily materialized.
    pub fn is_reachable(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.is_empty())
    }

    /// Pin a wrap entry to the commit its checkout resolved to. Returns true
    /// if the entry changed. No-op for non-wrap entries.
    pub fn lock_wrap(&mut self, commit: &str) -> bool {
        match self.manifest.wrap.as_mut() {
            Some(wrap) if wrap.locked.as_deref() != Some(commit) => {
                wrap.locked = Some(commit.to_string());
                true
            }
            _ => false,
        }
    }

    /// Carry the pinned commit over from a previous entry, as long as it
    /// still wraps the same remote.
    pub fn inherit_lock(&mut self, previous: &IndexEntry) {
        if let (Some(wrap), Some(prev)) = (self.manifest.wrap.as_mut(), previous.wrap()) {
            if wrap.locked.is_none() && wrap.remote == prev.remote {
                wrap.locked = prev.locked.clone();
            }
        }
    }
}

/// Parse a serialized index document. Any structural problem is an error;
/// a document is never partially accepted.
pub fn parse_index(bytes: &[u8]) -> Result<EngramIndex, CoreError> {
    serde_json::from_slice(bytes).map_err(|e| CoreError::InvalidIndex(e.to_string()))
}

pub fn serialize_index(index: &EngramIndex) -> Result<Vec<u8>, CoreError> {
    serde_json::to_vec_pretty(index).map_err(|e| CoreError::InvalidIndex(e.to_string()))
}
