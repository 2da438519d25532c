use std::path::PathBuf;

use engram_core::error::{CoreError, ErrorKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    /// Creating or refreshing the bare mirror failed (network, auth, bad URL).
    #[error("Failed to update cache mirror for {url}: {reason}")]
    Mirror { url: String, reason: String },

    /// The mirror is fine but registering the submodule failed.
    #[error("Failed to register submodule at {}: {reason}", path.display())]
    Submodule { path: PathBuf, reason: String },

    #[error("Failed to clone {url}: {reason}")]
    Clone { url: String, reason: String },

    #[error("Sparse checkout of {remote} failed: {reason}")]
    Checkout { remote: String, reason: String },

    #[error("Target already exists: {}", .0.display())]
    TargetExists(PathBuf),

    #[error("Could not lock cache entry {}: {reason}", path.display())]
    Lock { path: PathBuf, reason: String },

    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl CacheError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Mirror { .. } | Self::Clone { .. } | Self::Checkout { .. } | Self::Lock { .. } => {
                ErrorKind::Remote
            }
            Self::Submodule { .. } | Self::TargetExists(_) => ErrorKind::Conflict,
            Self::Git { .. } | Self::Io(_) => ErrorKind::Io,
            Self::Core(e) => e.kind(),
        }
    }

    /// The underlying git stderr (or message), for wrapping into a more
    /// specific variant.
    pub(crate) fn reason(self) -> String {
        match self {
            Self::Git { stderr, .. } => stderr,
            other => other.to_string(),
        }
    }
}
