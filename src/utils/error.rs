//! Error types shared across the broker.
//!
//! Request-path failures are returned synchronously as [`BrokerError`].
//! Acknowledging an unknown message is not an error; see
//! [`crate::broker::AckOutcome`].

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// Caller-correctable input problem. Never worth retrying unchanged.
    #[error("invalid {field}: {reason}")]
    Validation {
        field: &'static str,
        reason: &'static str,
    },

    /// A subscriber's pending queue is at its configured bound.
    #[error("pending queue for '{subscriber}' is full ({limit} records)")]
    Overloaded { subscriber: String, limit: usize },
}

impl BrokerError {
    pub fn empty(field: &'static str) -> Self {
        Self::Validation {
            field,
            reason: "must not be empty",
        }
    }

    /// JSON-RPC style error code for the boundary layer.
    pub fn code(&self) -> i32 {
        match self {
            Self::Validation { .. } => -32602,
            Self::Overloaded { .. } => -32000,
        }
    }
}

pub type Result<T> = std::result::Result<T, BrokerError>;

/// Errors surfaced by the tool-call boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("invalid params: {0}")]
    InvalidParams(#[from] serde_json::Error),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> i32 {
        match self {
            Self::UnknownTool(_) => -32601,
            Self::InvalidParams(_) => -32602,
            Self::Broker(e) => e.code(),
            Self::Internal(_) => -32603,
        }
    }
}
