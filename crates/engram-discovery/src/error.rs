use std::path::PathBuf;

use engram_core::error::{CoreError, ErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Engram at {}: {source}", path.display())]
    Engram {
        path: PathBuf,
        #[source]
        source: CoreError,
    },

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DiscoveryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Engram { source, .. } | Self::Core(source) => source.kind(),
            Self::Io(_) => ErrorKind::Io,
        }
    }
}
