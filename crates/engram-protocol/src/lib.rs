//! Moving the engram index between repositories.
//!
//! The index lives at `refs/engrams/index`, outside any branch, so it only
//! travels when a remote is told about it. This crate configures that and
//! performs explicit fetch/push of the index. Fetched indexes land in
//! `refs/engrams/remotes/<remote>/index` and only fast-forward the local ref.

pub mod error;
pub mod refspec;
pub mod sync;

pub use error::ProtocolError;
pub use refspec::{
    configure_auto_fetch, configure_remote, fetch_refspec, tracking_ref, ENGRAM_PUSH_REFSPEC,
};
pub use sync::{fetch_index, push_index, FetchResult, PushResult};
