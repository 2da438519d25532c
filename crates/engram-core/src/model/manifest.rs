use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Descriptions shorter than this are rejected; the host shows them as tool
/// descriptions and needs something to go on.
pub const MIN_DESCRIPTION_LEN: usize = 20;

/// Pattern lists for one trigger kind (disclosure or activation).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TriggerConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_msg: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agent_msg: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any_msg: Vec<String>,
}

impl TriggerConfig {
    pub fn is_empty(&self) -> bool {
        self.user_msg.is_empty() && self.agent_msg.is_empty() && self.any_msg.is_empty()
    }
}

/// A wrap engram's content is a sparse checkout of another repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrapConfig {
    pub remote: String,
    /// Branch or tag the author intends to track.
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sparse: Vec<String>,
    /// Commit the checkout resolved to. Written by materialization only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<String>,
}

impl WrapConfig {
    /// The ref to check out: the locked commit wins over the declared ref.
    pub fn checkout_ref(&self) -> Option<&str> {
        self.locked.as_deref().or(self.git_ref.as_deref())
    }
}

/// The `engram.toml` descriptor authored by an engram repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Manifest {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disclosure_triggers: Option<TriggerConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_triggers: Option<TriggerConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrap: Option<WrapConfig>,
}

impl Manifest {
    /// Parse and validate manifest text. `path` is only used for error context.
    pub fn parse(text: &str, path: &Path) -> Result<Self, CoreError> {
        let manifest: Manifest = toml::from_str(text).map_err(|e| CoreError::InvalidManifest {
            path: path.to_path_buf(),
            reason: e.message().to_string(),
        })?;
        manifest.validate(path)?;
        Ok(manifest)
    }

    /// Read and parse a manifest file from disk.
    pub fn from_path(path: &Path) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, path)
    }

    pub fn to_toml(&self) -> Result<String, CoreError> {
        toml::to_string(self).map_err(|e| CoreError::Config(format!("Manifest serialize: {e}")))
    }

    /// True if neither trigger set carries any pattern: always disclosed and
    /// always activated.
    pub fn is_permanent(&self) -> bool {
        self.disclosure_triggers
            .as_ref()
            .map_or(true, TriggerConfig::is_empty)
            && self
                .activation_triggers
                .as_ref()
                .map_or(true, TriggerConfig::is_empty)
    }

    fn validate(&self, path: &Path) -> Result<(), CoreError> {
        let invalid = |reason: String| CoreError::InvalidManifest {
            path: path.to_path_buf(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("`name` must not be empty".into()));
        }
        let len = self.description.trim().chars().count();
        if len < MIN_DESCRIPTION_LEN {
            return Err(invalid(format!(
                "`description` must be at least {MIN_DESCRIPTION_LEN} characters, got {len}"
            )));
        }
        if let Some(wrap) = &self.wrap {
            if wrap.remote.trim().is_empty() {
                return Err(invalid("`wrap.remote` must not be empty".into()));
            }
            if wrap.sparse.iter().any(|p| p.trim().is_empty()) {
                return Err(invalid("`wrap.sparse` contains an empty pattern".into()));
            }
        }
        Ok(())
    }
}
