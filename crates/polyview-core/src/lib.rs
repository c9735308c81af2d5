pub mod config;
pub mod error;
pub mod layout;
pub mod panel;
pub mod preferences;
pub mod service;
pub mod session;
pub mod store;

// Re-export common error type
pub use error::{PolyviewError, Result};
