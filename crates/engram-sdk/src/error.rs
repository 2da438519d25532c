use std::path::PathBuf;

use engram_cache::CacheError;
use engram_core::error::{CoreError, ErrorKind};
use engram_discovery::DiscoveryError;
use engram_protocol::ProtocolError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SdkError {
    #[error("Invalid repository reference: {0} (formats: owner/repo, alias:owner/repo, or a full URL)")]
    InvalidRepoRef(String),

    #[error("Invalid engram name: {0:?}")]
    InvalidName(String),

    #[error("Not in a project directory")]
    NotInProject,

    #[error("Engram already exists at {} (use force to overwrite)", .0.display())]
    TargetExists(PathBuf),

    #[error("Refusing to clean up {}: outside {}", path.display(), root.display())]
    PathEscape { path: PathBuf, root: PathBuf },

    #[error("Engram '{name}' not found in index (available: {})", available.join(", "))]
    NotInIndex { name: String, available: Vec<String> },

    #[error("Engram '{0}' has no [wrap] config and no index entry")]
    NotLazy(String),

    #[error("Engram '{0}' has no remote to initialize from")]
    NoRemote(String),

    #[error("No engram index found")]
    NoIndex,

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<git2::Error> for SdkError {
    fn from(e: git2::Error) -> Self {
        Self::Core(CoreError::Git(e))
    }
}

impl SdkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRepoRef(_) | Self::InvalidName(_) => ErrorKind::Validation,
            Self::TargetExists(_) | Self::PathEscape { .. } => ErrorKind::Conflict,
            Self::NotInProject
            | Self::NotInIndex { .. }
            | Self::NotLazy(_)
            | Self::NoRemote(_)
            | Self::NoIndex => ErrorKind::State,
            Self::Cache(e) => e.kind(),
            Self::Protocol(e) => e.kind(),
            Self::Discovery(e) => e.kind(),
            Self::Core(e) => e.kind(),
            Self::Io(_) => ErrorKind::Io,
        }
    }
}
