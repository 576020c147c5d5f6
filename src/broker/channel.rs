//! Channel and subscription management
//!
//! A `Channel` holds the subscriptions for one channel name together with a
//! live count of the delivery records still pending on it. Subscriptions are
//! keyed by subscriber id, so subscribing twice replaces the filter rather
//! than adding a second entry.
//!
//! Each channel guards its subscriber map with its own `RwLock`; publishers
//! take a copy of the map (`snapshot`) and release the lock before fanning
//! out.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::broker::message::Message;

pub type SubscriberId = String;

/// Optional per-subscription filter.
///
/// Only envelope fields are evaluated: `sender` must match exactly and
/// `min_priority` is an inclusive lower bound. Any other keys are kept and
/// echoed back to the caller but play no part in routing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_priority: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SubscriptionFilter {
    pub fn matches(&self, message: &Message) -> bool {
        self.sender.as_ref().is_none_or(|s| *s == message.sender)
            && self.min_priority.is_none_or(|min| message.priority >= min)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub channel: Arc<str>,
    pub subscriber: SubscriberId,
    pub filter: Option<SubscriptionFilter>,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    pub fn accepts(&self, message: &Message) -> bool {
        self.filter.as_ref().is_none_or(|f| f.matches(message))
    }
}

#[derive(Debug)]
pub struct Channel {
    pub name: Arc<str>,
    pub created_at: DateTime<Utc>,
    subscribers: RwLock<HashMap<SubscriberId, Subscription>>,
    pending: AtomicUsize,
}

impl Channel {
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            created_at: Utc::now(),
            subscribers: RwLock::new(HashMap::new()),
            pending: AtomicUsize::new(0),
        }
    }

    /// Adds or replaces a subscription. The original `created_at` survives an
    /// upsert. Returns the subscriber count after the change.
    pub fn subscribe(&self, id: SubscriberId, filter: Option<SubscriptionFilter>) -> usize {
        let mut subscribers = self.subscribers.write();
        match subscribers.get_mut(&id) {
            Some(existing) => existing.filter = filter,
            None => {
                let sub = Subscription {
                    channel: self.name.clone(),
                    subscriber: id.clone(),
                    filter,
                    created_at: Utc::now(),
                };
                subscribers.insert(id, sub);
            }
        }
        subscribers.len()
    }

    /// Removes a subscriber. Returns whether it was present.
    pub fn unsubscribe(&self, id: &str) -> bool {
        self.subscribers.write().remove(id).is_some()
    }

    /// Copy-on-read view of the current subscriptions.
    pub fn snapshot(&self) -> Vec<Subscription> {
        self.subscribers.read().values().cloned().collect()
    }

    pub fn subscription(&self, id: &str) -> Option<Subscription> {
        self.subscribers.read().get(id).cloned()
    }

    pub fn subscriber_ids(&self) -> Vec<SubscriberId> {
        let mut ids: Vec<_> = self.subscribers.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub(crate) fn add_pending(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    /// Decrements the pending count, saturating at zero.
    pub(crate) fn sub_pending(&self) {
        let _ = self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }
}
