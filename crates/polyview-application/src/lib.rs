//! Application layer: wires user actions to the Polyview core.

pub mod crosscheck;
pub mod dispatch;
pub mod load_wait;
pub mod logging;
pub mod orchestrator;

pub use dispatch::{Completion, DirectCallAdapter, DispatchTask, Dispatcher, RequestError};
pub use orchestrator::{Orchestrator, ResizeTarget};
