use engram_core::error::{git_error_kind, CoreError, ErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Remote not found: {0}")]
    RemoteNotFound(String),

    #[error("Fetch from {remote} failed: {reason}")]
    Fetch { remote: String, reason: String },

    #[error("Push to {remote} rejected: {reason}")]
    Push { remote: String, reason: String },

    #[error("No local engram index to push")]
    NoIndex,

    /// Local and remote indexes both have commits the other lacks.
    #[error("Engram index diverged from {remote} (local {local}, remote {theirs})")]
    Diverged {
        remote: String,
        local: String,
        theirs: String,
    },
}

impl ProtocolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Git(e) => git_error_kind(e),
            Self::Core(e) => e.kind(),
            Self::RemoteNotFound(_) | Self::NoIndex => ErrorKind::State,
            Self::Fetch { .. } => ErrorKind::Remote,
            // A non-fast-forward rejection means someone else wrote first.
            Self::Push { .. } | Self::Diverged { .. } => ErrorKind::Conflict,
        }
    }
}
