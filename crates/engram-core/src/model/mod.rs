pub mod index;
pub mod manifest;

pub use index::{parse_index, serialize_index, EngramIndex, IndexEntry};
pub use manifest::{Manifest, TriggerConfig, WrapConfig, MIN_DESCRIPTION_LEN};
