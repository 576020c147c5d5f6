//! Broker engine
//!
//! This module contains the in-memory broker responsible for:
//! - managing channels and their subscriptions (via `ChannelRegistry`)
//! - fanning published messages out into per-subscriber pending queues
//! - serving pending records to subscribers until they are acknowledged
//! - expiring records whose TTL has passed
//! - recording throughput and latency metrics
//!
//! Concurrency and usage notes:
//! - Every method takes `&self`; the broker is meant to be shared as
//!   `Arc<Broker>` across tasks without an outer lock.
//! - Publishing reads a copy of the channel's subscriber set and then
//!   enqueues into each subscriber's queue, taking one queue lock at a time.
//! - Expiration runs lazily on every read and periodically from the
//!   background sweeper (see `sweeper`).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::broker::channel::{SubscriberId, SubscriptionFilter};
use crate::broker::message::{DeliveryRecord, Message, MessageId};
use crate::broker::metrics::{Gauges, MetricEvent, MetricsCollector, MetricsSnapshot};
use crate::broker::queue::MessageStore;
use crate::broker::registry::{ChannelInfo, ChannelRegistry};
use crate::config::BrokerSettings;
use crate::utils::{BrokerError, Result};

/// Runtime options for a `Broker`.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerOptions {
    /// Applied when a publish carries no TTL.
    pub default_ttl: Option<Duration>,
    /// Backpressure bound per subscriber queue.
    pub max_pending_per_subscriber: Option<usize>,
    pub latency_window: usize,
}

impl Default for BrokerOptions {
    fn default() -> Self {
        Self::from(&BrokerSettings::default())
    }
}

/// Settings are expected to have passed `load_config` validation; a
/// default TTL that is not a usable positive duration is ignored here.
impl From<&BrokerSettings> for BrokerOptions {
    fn from(settings: &BrokerSettings) -> Self {
        Self {
            default_ttl: settings
                .default_ttl_secs
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                .filter(|ttl| !ttl.is_zero()),
            max_pending_per_subscriber: settings.max_pending_per_subscriber,
            latency_window: settings.latency_window,
        }
    }
}

/// Returned by a successful publish.
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    pub message_id: MessageId,
    pub channel: String,
    pub timestamp: DateTime<Utc>,
    /// Time from receipt of the publish to the last record being enqueued.
    pub latency: Duration,
    /// Delivery records created.
    pub recipients: usize,
    /// Subscribers whose queue refused the record.
    pub rejected: Vec<SubscriberId>,
}

/// Channel state reported after a subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscribeOutcome {
    pub subscriber_count: usize,
    /// Records still pending on the channel.
    pub message_count: usize,
}

#[derive(Debug)]
pub struct Broker {
    pub(crate) registry: ChannelRegistry,
    pub(crate) store: MessageStore,
    pub(crate) metrics: MetricsCollector,
    options: BrokerOptions,
    sequence: AtomicU64,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(BrokerOptions::default())
    }
}

impl Broker {
    pub fn new(options: BrokerOptions) -> Self {
        Self {
            registry: ChannelRegistry::new(),
            store: MessageStore::new(options.max_pending_per_subscriber),
            metrics: MetricsCollector::new(options.latency_window),
            options,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn options(&self) -> &BrokerOptions {
        &self.options
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Subscribes `subscriber` to `channel`, creating the channel if needed.
    /// Subscribing again replaces the filter.
    pub fn subscribe(
        &self,
        channel: &str,
        subscriber: &str,
        filter: Option<SubscriptionFilter>,
    ) -> Result<SubscribeOutcome> {
        let subscriber_count = self.registry.subscribe(channel, subscriber, filter)?;
        let message_count = self.registry.get(channel).map_or(0, |c| c.pending());
        info!(channel, subscriber, subscriber_count, "subscribed");
        Ok(SubscribeOutcome {
            subscriber_count,
            message_count,
        })
    }

    /// Removes a subscription. Records already enqueued for the subscriber
    /// stay readable until acknowledged or expired.
    pub fn unsubscribe(&self, channel: &str, subscriber: &str) -> bool {
        let found = self.registry.unsubscribe(channel, subscriber);
        if found {
            info!(channel, subscriber, "unsubscribed");
            self.drop_idle_queue(subscriber);
        } else {
            debug!(channel, subscriber, "unsubscribe for unknown subscription");
        }
        found
    }

    /// Discards the subscriber's queue when it is empty and the subscriber
    /// has no subscription left. A later subscribe starts a fresh queue.
    pub(crate) fn drop_idle_queue(&self, subscriber: &str) -> bool {
        if self.registry.is_subscribed(subscriber) {
            return false;
        }
        let dropped = self.store.drop_idle(subscriber);
        if dropped {
            debug!(subscriber, "dropped idle queue");
        }
        dropped
    }

    /// Publishes `content` to every current subscriber of `channel` whose
    /// filter accepts it.
    ///
    /// Publishing to a channel nobody listens to succeeds, creates the
    /// channel and produces no delivery records.
    pub fn publish(
        &self,
        channel: &str,
        sender: &str,
        content: serde_json::Value,
        priority: i64,
        ttl: Option<Duration>,
    ) -> Result<PublishReceipt> {
        let started = Instant::now();

        if channel.is_empty() {
            return Err(BrokerError::empty("channel"));
        }
        if sender.is_empty() {
            return Err(BrokerError::empty("sender"));
        }
        if content.is_null() || content.as_str().is_some_and(str::is_empty) {
            return Err(BrokerError::empty("content"));
        }
        let ttl = ttl.or(self.options.default_ttl);
        if ttl.is_some_and(|t| t.is_zero()) {
            return Err(BrokerError::Validation {
                field: "ttl_seconds",
                reason: "must be positive",
            });
        }

        let sequence = self.sequence.fetch_add(1, Ordering::AcqRel);
        let message = Arc::new(Message {
            id: Uuid::new_v4().to_string(),
            channel: channel.to_string(),
            sender: sender.to_string(),
            content,
            priority,
            timestamp: Utc::now(),
            created_at: started,
            ttl,
        });

        let target = self.registry.ensure(channel);
        let mut recipients = 0;
        let mut rejected = Vec::new();

        for sub in target.snapshot() {
            if !sub.accepts(&message) {
                continue;
            }
            let record = DeliveryRecord::new(message.clone(), sub.subscriber.clone(), sequence);
            // count before enqueue so a racing ack never sees zero
            target.add_pending();
            match self.store.enqueue(&sub.subscriber, record) {
                Ok(()) => recipients += 1,
                Err(e) => {
                    target.sub_pending();
                    self.metrics.record(MetricEvent::Failed, None);
                    warn!(channel, message_id = %message.id, "{e}");
                    rejected.push(sub.subscriber);
                }
            }
        }

        let latency = started.elapsed();
        self.metrics.record(MetricEvent::Sent, Some(latency));

        debug!(
            channel,
            sender,
            message_id = %message.id,
            recipients,
            latency_us = latency.as_micros() as u64,
            "published"
        );

        Ok(PublishReceipt {
            message_id: message.id.clone(),
            channel: channel.to_string(),
            timestamp: message.timestamp,
            latency,
            recipients,
            rejected,
        })
    }

    /// Returns up to `limit` pending records for `subscriber` in priority
    /// order, optionally restricted to one channel. Records are not removed;
    /// reading again before acknowledging returns them again.
    pub fn get_messages(
        &self,
        subscriber: &str,
        channel: Option<&str>,
        limit: usize,
    ) -> Result<Vec<DeliveryRecord>> {
        if subscriber.is_empty() {
            return Err(BrokerError::empty("agent_id"));
        }
        if limit == 0 {
            return Err(BrokerError::Validation {
                field: "limit",
                reason: "must be at least 1",
            });
        }

        let dequeued = self
            .store
            .dequeue(subscriber, limit, channel, Instant::now());
        self.retire_expired(dequeued.expired);

        debug!(subscriber, count = dequeued.records.len(), "retrieved messages");
        Ok(dequeued.records)
    }

    /// Number of records currently pending for one subscriber.
    pub fn pending_for(&self, subscriber: &str) -> usize {
        self.store.pending_for(subscriber)
    }

    pub fn list_channels(&self) -> Vec<ChannelInfo> {
        self.registry.list()
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot(Gauges {
            channels: self.registry.channel_count(),
            subscribers: self.registry.subscriber_count(),
            pending: self.store.pending(),
        })
    }

    /// Accounts for records that left their queue as expired. Returns the
    /// number of records whose channel could not be found.
    pub(crate) fn retire_expired(&self, records: Vec<DeliveryRecord>) -> usize {
        let mut errors = 0;
        for record in records {
            self.metrics.record(MetricEvent::Failed, None);
            if !self.release_channel(&record) {
                errors += 1;
                warn!(
                    channel = record.channel(),
                    message_id = record.message_id(),
                    "expired record references unknown channel"
                );
                continue;
            }
            debug!(
                channel = record.channel(),
                subscriber = %record.subscriber,
                message_id = record.message_id(),
                "expired"
            );
        }
        errors
    }

    /// Decrements the owning channel's pending count.
    pub(crate) fn release_channel(&self, record: &DeliveryRecord) -> bool {
        match self.registry.get(record.channel()) {
            Some(channel) => {
                channel.sub_pending();
                true
            }
            None => false,
        }
    }
}
