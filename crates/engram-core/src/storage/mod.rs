pub mod index_store;
pub mod objects;
pub mod read;
pub mod refs;

pub use index_store::{
    index_exists, parse_engram_toml, read_index, write_index, IndexSnapshot, IndexStore,
};
pub use refs::{ENGRAM_REF_PREFIX, INDEX_REF};
