//! The `api` module maps the broker onto the boundary operations an external
//! RPC layer exposes to agents: typed requests/responses and a by-name tool
//! dispatcher.

pub mod message;
pub mod service;

pub use message::*;
pub use service::{MessageQueueService, TOOLS};
