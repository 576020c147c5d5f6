//! Channel registry
//!
//! Owns every named channel. The map itself is a sharded `DashMap`, and each
//! channel carries its own subscriber lock, so subscribe/unsubscribe on one
//! channel never contends with a publish on another.
//!
//! Channels are created implicitly by `subscribe` or `ensure` and are never
//! removed; unsubscribing the last subscriber only empties them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::broker::channel::{Channel, SubscriberId, Subscription, SubscriptionFilter};
use crate::utils::{BrokerError, Result};

/// Point-in-time description of a channel, as returned by `list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelInfo {
    pub name: String,
    pub subscribers: Vec<SubscriberId>,
    pub subscriber_count: usize,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: DashMap<Arc<str>, Arc<Channel>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the channel, creating it if absent.
    pub fn ensure(&self, name: &str) -> Arc<Channel> {
        if let Some(channel) = self.channels.get(name) {
            return channel.value().clone();
        }
        self.channels
            .entry(Arc::from(name))
            .or_insert_with(|| Arc::new(Channel::new(name)))
            .value()
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels.get(name).map(|c| c.value().clone())
    }

    /// Creates the channel if needed and upserts the subscription.
    /// Returns the channel's subscriber count afterwards.
    pub fn subscribe(
        &self,
        channel: &str,
        subscriber: &str,
        filter: Option<SubscriptionFilter>,
    ) -> Result<usize> {
        if channel.is_empty() {
            return Err(BrokerError::empty("channel"));
        }
        if subscriber.is_empty() {
            return Err(BrokerError::empty("agent_id"));
        }
        Ok(self.ensure(channel).subscribe(subscriber.to_string(), filter))
    }

    /// Idempotent; returns whether a subscription was removed.
    pub fn unsubscribe(&self, channel: &str, subscriber: &str) -> bool {
        self.get(channel)
            .is_some_and(|c| c.unsubscribe(subscriber))
    }

    /// Copy of the channel's subscriptions; empty for unknown channels.
    pub fn snapshot(&self, channel: &str) -> Vec<Subscription> {
        self.get(channel).map(|c| c.snapshot()).unwrap_or_default()
    }

    /// Snapshot of every channel, sorted by name. Each call re-reads the
    /// registry, so the result can be requested again for a fresh view.
    pub fn list(&self) -> Vec<ChannelInfo> {
        let channels: Vec<Arc<Channel>> = self.channels.iter().map(|e| e.value().clone()).collect();

        let mut infos: Vec<ChannelInfo> = channels
            .iter()
            .map(|c| {
                let subscribers = c.subscriber_ids();
                ChannelInfo {
                    name: c.name.to_string(),
                    subscriber_count: subscribers.len(),
                    subscribers,
                    message_count: c.pending(),
                    created_at: c.created_at,
                }
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Whether `subscriber` holds a subscription on any channel.
    pub fn is_subscribed(&self, subscriber: &str) -> bool {
        self.channels
            .iter()
            .any(|e| e.value().subscription(subscriber).is_some())
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Total subscriptions across all channels.
    pub fn subscriber_count(&self) -> usize {
        self.channels
            .iter()
            .map(|e| e.value().subscriber_count())
            .sum()
    }
}
