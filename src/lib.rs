//! # agentmq
//!
//! `agentmq` is an in-memory, channel-based publish/subscribe broker for
//! coordinating independent agents. Published messages are fanned out into a
//! pending queue per subscriber, stay visible until acknowledged, and are
//! discarded once their TTL passes.
//!
//! ## Core Modules
//!
//! - `broker`: channels, per-subscriber queues, delivery, acknowledgment,
//!   expiration and metrics.
//! - `api`: request/response types and tool dispatch for an external RPC layer.
//! - `config`: loading settings from file and environment.
//! - `utils`: error types and logging setup.

pub mod api;
pub mod broker;
pub mod config;
pub mod utils;

pub use api::MessageQueueService;
pub use broker::{Broker, BrokerOptions, ExpirationSweeper};
pub use config::{Settings, load_config};
