use std::path::PathBuf;

use thiserror::Error;

/// Coarse classification shared by every error type in the workspace.
///
/// Callers use it to decide between retrying (`Remote`), re-reading and
/// reapplying or forcing (`Conflict`), fixing input (`Validation`) and
/// reporting without aborting a batch (`State`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Remote,
    Conflict,
    State,
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::Remote => "remote",
            Self::Conflict => "conflict",
            Self::State => "state",
            Self::Io => "io",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("Invalid manifest {}: {reason}", path.display())]
    InvalidManifest { path: PathBuf, reason: String },

    #[error("Invalid engram index: {0}")]
    InvalidIndex(String),

    #[error("Engram index was updated concurrently (expected {expected}, found {actual})")]
    IndexConflict { expected: String, actual: String },

    #[error("Invalid trigger pattern: {0}")]
    Trigger(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Missing blob in index tree: {0}")]
    MissingBlob(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Git(e) => git_error_kind(e),
            Self::InvalidManifest { .. }
            | Self::InvalidIndex(_)
            | Self::Trigger(_)
            | Self::Utf8(_)
            | Self::MissingBlob(_) => ErrorKind::Validation,
            Self::IndexConflict { .. } => ErrorKind::Conflict,
            Self::Config(_) => ErrorKind::State,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

/// Classify a libgit2 error by its class and code.
pub fn git_error_kind(e: &git2::Error) -> ErrorKind {
    use git2::{ErrorClass, ErrorCode};

    match (e.class(), e.code()) {
        (_, ErrorCode::Modified | ErrorCode::Exists | ErrorCode::Locked) => ErrorKind::Conflict,
        (ErrorClass::Net | ErrorClass::Ssl | ErrorClass::Http | ErrorClass::Ssh, _) => {
            ErrorKind::Remote
        }
        (_, ErrorCode::Auth | ErrorCode::Certificate) => ErrorKind::Remote,
        _ => ErrorKind::Io,
    }
}
