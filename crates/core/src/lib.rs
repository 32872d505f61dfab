pub mod config;
pub mod error;
pub mod store;

pub use config::Config;
pub use error::*;
pub use store::{JsonFileStore, KvStore, MemoryStore};
