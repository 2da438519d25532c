//! Local cache of bare mirrors keyed by normalized remote URL.
//!
//! Every add/clone/sparse-checkout goes through a mirror: the mirror is
//! created or refreshed under an exclusive per-URL file lock, and the working
//! copy borrows its object store (`--reference`) instead of downloading the
//! history again.

pub mod error;
pub mod git;
pub mod lock;
pub mod mirror;
pub mod url;

pub use error::CacheError;
pub use mirror::{is_submodule_initialized, RepoCache, SparseCheckout, SubmoduleAddOptions};
pub use url::{cache_key, normalize_url};
