//! Storage adapters, path resolution and configuration loading for Polyview.

pub mod config_service;
pub mod file_store;
pub mod memory_store;
pub mod paths;
mod quota;

pub use config_service::ConfigService;
pub use file_store::JsonFileStore;
pub use memory_store::InMemoryStore;
pub use paths::{PathError, PolyviewPaths};
