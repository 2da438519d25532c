//! Rust SDK for managing engrams in a project.
//!
//! [`EngramManager`] ties together the user's [`Settings`], the mirror cache
//! and the project's index ref:
//!
//! - [`EngramManager::add`] installs an engram (submodule or clone).
//! - [`EngramManager::initialize_lazy_module`] and
//!   [`EngramManager::initialize_all_lazy_modules`] materialize engrams that
//!   are only known from the index.
//! - [`EngramManager::list_index`] and [`EngramManager::list_modules`] report
//!   what is known and what is on disk.
//!
//! # Example
//! ```no_run
//! use engram_sdk::{EngramManager, Settings};
//!
//! let manager = EngramManager::new(Settings::load().unwrap(), Some("/work/project".into()));
//! let report = manager.initialize_all_lazy_modules().unwrap();
//! for (name, err) in &report.failed {
//!     eprintln!("{name}: {err}");
//! }
//! ```

mod add;
mod error;
mod lazy;
mod listing;
mod manager;
mod repo_ref;
#[cfg(test)]
mod test_support;

pub use add::{AddOutcome, AddRequest, Scope};
pub use error::SdkError;
pub use lazy::{BatchReport, EngramState, InitOutcome};
pub use listing::{IndexListing, IndexListingEntry};
pub use manager::{EngramManager, InitReport};
pub use repo_ref::{engram_name_for, parse_repo_ref, supported_aliases, RepoRef};

// Re-export types SDK users need alongside the manager
pub use engram_core::config::{find_project_root, Settings};
pub use engram_core::model::{EngramIndex, IndexEntry, Manifest};
pub use engram_core::ErrorKind;
pub use engram_discovery::{render_tree, Engram, FileTreeOptions};
