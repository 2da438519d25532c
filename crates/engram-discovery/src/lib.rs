//! Builds the list of engrams handed to an agent host.
//!
//! Engrams come from two places: directories on disk (global and
//! project-local) and the project's index ref, which names engrams that are
//! registered but not checked out yet. [`discover_engrams_with_lazy`] merges
//! both, with disk winning.

pub mod discover;
pub mod engram;
pub mod error;
pub mod file_tree;
pub mod paths;
pub mod tool_name;

pub use discover::{
    discover_engrams, discover_engrams_with_lazy, find_engram_files, get_engrams_from_index,
    read_index_ref,
};
pub use engram::{parse_engram, Engram};
pub use error::DiscoveryError;
pub use file_tree::{render_tree, FileTreeOptions};
pub use paths::{get_default_engram_paths, EngramPaths};
pub use tool_name::{generate_tool_name, sanitize_tool_name};
