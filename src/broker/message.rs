//! Message and delivery record definitions.
//!
//! A `Message` is immutable once published and shared behind an `Arc` by
//! every delivery record fanned out from it. The `content` field is an
//! opaque JSON value; the broker never looks inside it.
//!
//! Two clocks are carried:
//! - `timestamp` is wall-clock time, reported to callers
//! - `created_at` is monotonic and is the only clock used for TTL decisions

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::broker::channel::SubscriberId;

pub type MessageId = String;

#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub channel: String,
    pub sender: String,
    pub content: serde_json::Value,
    pub priority: i64,
    pub timestamp: DateTime<Utc>,
    pub created_at: Instant,
    pub ttl: Option<Duration>,
}

impl Message {
    /// Monotonic deadline, `None` for messages that never expire. A TTL too
    /// large for the clock to represent never expires either.
    pub fn expires_at(&self) -> Option<Instant> {
        self.created_at.checked_add(self.ttl?)
    }

    /// A message is expired once `created_at + ttl < now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at().is_some_and(|deadline| deadline < now)
    }

    /// Wall-clock expiry, for reporting only.
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        let ttl = chrono::Duration::from_std(self.ttl?).ok()?;
        self.timestamp.checked_add_signed(ttl)
    }
}

/// Lifecycle of a single delivery record. `Acknowledged` and `Expired` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckState {
    Pending,
    Acknowledged,
    Expired,
}

/// One subscriber's copy of a published message.
#[derive(Debug, Clone)]
pub struct DeliveryRecord {
    pub message: Arc<Message>,
    pub subscriber: SubscriberId,
    /// Global arrival order, breaks priority ties.
    pub sequence: u64,
    pub delivery_time: DateTime<Utc>,
    pub state: AckState,
}

impl DeliveryRecord {
    pub fn new(message: Arc<Message>, subscriber: SubscriberId, sequence: u64) -> Self {
        Self {
            message,
            subscriber,
            sequence,
            delivery_time: Utc::now(),
            state: AckState::Pending,
        }
    }

    pub fn message_id(&self) -> &str {
        &self.message.id
    }

    pub fn channel(&self) -> &str {
        &self.message.channel
    }

    pub fn priority(&self) -> i64 {
        self.message.priority
    }

    /// Moves the record out of `Pending`. Terminal states are never left.
    pub(crate) fn finish(mut self, state: AckState) -> Self {
        if self.state == AckState::Pending {
            self.state = state;
        }
        self
    }
}
