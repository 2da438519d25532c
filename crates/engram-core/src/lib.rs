pub mod config;
pub mod error;
pub mod model;
pub mod storage;
pub mod triggers;

pub use error::{CoreError, ErrorKind};
