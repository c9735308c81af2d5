//! Session domain module.
//!
//! # Module Structure
//!
//! - `model`: Core session domain model (`Session`, `SessionId`)
//! - `message`: Chat transcript types (`MessageRole`, `ChatMessage`)
//! - `mode`: Session content mode (`SessionMode`)
//! - `store`: Session list, current pointer and persistence (`SessionStore`)
//! - `history`: Sliding-window chat history (`ChatHistoryManager`)

mod history;
mod message;
mod mode;
mod model;
mod store;

pub use history::ChatHistoryManager;
pub use message::{ChatMessage, MessageRole};
pub use mode::SessionMode;
pub use model::{Session, SessionId};
pub use store::{LoadOptions, LoadReport, NoUrlSource, Repair, SessionStore, UrlSource};
