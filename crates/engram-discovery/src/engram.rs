use std::fs;
use std::path::{Path, PathBuf};

use engram_core::config::{CONTENT_DIR, MANIFEST_FILENAME, README_FILENAME};
use engram_core::model::{IndexEntry, Manifest};
use engram_core::triggers::ContextTriggerMatcher;
use serde::Serialize;

use crate::error::DiscoveryError;
use crate::tool_name::sanitize_tool_name;

/// One engram as seen by the host. Built fresh on every discovery.
#[derive(Debug, Clone, Serialize)]
pub struct Engram {
    pub name: String,
    pub tool_name: String,
    pub description: String,
    /// Absolute; does not exist yet for index-only engrams.
    pub directory: PathBuf,
    /// README body, empty while lazy.
    pub content: String,
    pub is_lazy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip)]
    pub matcher: ContextTriggerMatcher,
}

impl Engram {
    /// `"<name>: <description>"`, the text registered with the host's tool.
    pub fn tool_description(&self) -> String {
        format!("{}: {}", self.name, self.description)
    }

    /// Index-only engram that would live at `directory` once materialized.
    pub(crate) fn from_index_entry(
        key: &str,
        entry: &IndexEntry,
        directory: PathBuf,
    ) -> Result<Self, DiscoveryError> {
        let matcher = ContextTriggerMatcher::new(
            entry.disclosure_triggers(),
            entry.activation_triggers(),
        )?;
        Ok(Self {
            name: key.to_string(),
            tool_name: sanitize_tool_name(key),
            description: entry.description().to_string(),
            directory,
            content: String::new(),
            is_lazy: true,
            url: entry.url.clone(),
            matcher,
        })
    }
}

/// Read the engram in `dir`. `Ok(None)` if there is no manifest; a manifest
/// that does not parse is an error.
pub fn parse_engram(dir: &Path) -> Result<Option<Engram>, DiscoveryError> {
    let manifest_path = dir.join(MANIFEST_FILENAME);
    if !manifest_path.is_file() {
        return Ok(None);
    }
    let with_path = |source| DiscoveryError::Engram {
        path: dir.to_path_buf(),
        source,
    };

    let manifest = Manifest::from_path(&manifest_path).map_err(with_path)?;
    let matcher = ContextTriggerMatcher::from_manifest(&manifest).map_err(with_path)?;
    let content = match fs::read_to_string(dir.join(README_FILENAME)) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    // A wrap engram's manifest is tracked by the project; its content is not
    // there until materialized.
    let is_lazy = manifest.wrap.is_some() && !dir.join(CONTENT_DIR).is_dir();

    Ok(Some(Engram {
        tool_name: sanitize_tool_name(&manifest.name),
        name: manifest.name,
        description: manifest.description,
        directory: dir.to_path_buf(),
        content,
        is_lazy,
        url: manifest.wrap.map(|w| w.remote),
        matcher,
    }))
}
