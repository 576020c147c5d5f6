//! Acknowledgment handling
//!
//! Records are visible until the subscriber acknowledges them, which gives
//! at-least-once delivery. Acknowledging is idempotent: a second ack, an ack
//! for an expired record, or an ack for an id the broker never issued all
//! report `NotFound` rather than failing.

use tokio::time::Instant;
use tracing::debug;

use crate::broker::engine::Broker;
use crate::broker::metrics::MetricEvent;
use crate::broker::queue::Removal;
use crate::utils::{BrokerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundReason {
    /// Unknown id, or already acknowledged or swept.
    Unknown,
    /// The record was still queued but past its TTL.
    Expired,
}

impl NotFoundReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "Message not found",
            Self::Expired => "Message expired",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Acknowledged,
    NotFound(NotFoundReason),
}

impl AckOutcome {
    pub fn is_acknowledged(self) -> bool {
        matches!(self, Self::Acknowledged)
    }
}

impl Broker {
    /// Removes `subscriber`'s delivery record for `message_id`. Other
    /// subscribers' records for the same message are untouched.
    pub fn ack(&self, message_id: &str, subscriber: &str) -> Result<AckOutcome> {
        if message_id.is_empty() {
            return Err(BrokerError::empty("message_id"));
        }
        if subscriber.is_empty() {
            return Err(BrokerError::empty("agent_id"));
        }

        let outcome = match self.store.remove(subscriber, message_id, Instant::now()) {
            Removal::Acknowledged(record) => {
                self.release_channel(&record);
                self.metrics.record(MetricEvent::Delivered, None);
                AckOutcome::Acknowledged
            }
            Removal::Expired(record) => {
                self.retire_expired(vec![record]);
                AckOutcome::NotFound(NotFoundReason::Expired)
            }
            Removal::Missing => AckOutcome::NotFound(NotFoundReason::Unknown),
        };

        debug!(message_id, subscriber, ?outcome, "acknowledge");
        Ok(outcome)
    }
}
