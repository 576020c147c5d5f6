//! Pending delivery records
//!
//! `PendingQueue` holds one subscriber's unacknowledged records, ordered by
//! priority (highest first) and then by arrival sequence. Reads never remove
//! anything: a record stays visible until it is acknowledged or expires.
//!
//! Alongside the ordered map the queue keeps an id index for O(log n)
//! acknowledgment and an expiry index so pruning only touches records that
//! are actually past their deadline.
//!
//! `MessageStore` maps subscriber ids to queues. Each queue has its own
//! mutex. Enqueueing locks the queue while holding a map guard; every other
//! operation clones the queue out of the map first.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::broker::channel::SubscriberId;
use crate::broker::message::{AckState, DeliveryRecord, MessageId};
use crate::utils::{BrokerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    priority: Reverse<i64>,
    sequence: u64,
}

impl QueueKey {
    fn of(record: &DeliveryRecord) -> Self {
        Self {
            priority: Reverse(record.priority()),
            sequence: record.sequence,
        }
    }
}

#[derive(Debug, Default)]
struct QueueInner {
    records: BTreeMap<QueueKey, DeliveryRecord>,
    by_id: HashMap<MessageId, QueueKey>,
    expiry: BTreeSet<(Instant, QueueKey)>,
}

impl QueueInner {
    fn take(&mut self, key: QueueKey) -> Option<DeliveryRecord> {
        let record = self.records.remove(&key)?;
        self.by_id.remove(record.message_id());
        if let Some(deadline) = record.message.expires_at() {
            self.expiry.remove(&(deadline, key));
        }
        Some(record)
    }

    fn prune(&mut self, now: Instant) -> Vec<DeliveryRecord> {
        let mut expired = Vec::new();
        while let Some(&(deadline, key)) = self.expiry.first() {
            if deadline >= now {
                break;
            }
            self.expiry.pop_first();
            if let Some(record) = self.take(key) {
                expired.push(record.finish(AckState::Expired));
            }
        }
        expired
    }
}

/// What happened to a removal request.
#[derive(Debug)]
pub enum Removal {
    Acknowledged(DeliveryRecord),
    /// The record existed but was already past its TTL.
    Expired(DeliveryRecord),
    Missing,
}

/// Result of a read: the visible records plus anything pruned on the way.
#[derive(Debug, Default)]
pub struct Dequeued {
    pub records: Vec<DeliveryRecord>,
    pub expired: Vec<DeliveryRecord>,
}

#[derive(Debug)]
pub struct PendingQueue {
    pub subscriber: SubscriberId,
    inner: Mutex<QueueInner>,
}

impl PendingQueue {
    pub fn new(subscriber: SubscriberId) -> Self {
        Self {
            subscriber,
            inner: Mutex::new(QueueInner::default()),
        }
    }

    /// Inserts a record, or refuses it when the queue already holds `limit`
    /// records. Existing records are never displaced.
    pub fn enqueue(&self, record: DeliveryRecord, limit: Option<usize>) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some(limit) = limit.filter(|&l| inner.records.len() >= l) {
            return Err(BrokerError::Overloaded {
                subscriber: self.subscriber.clone(),
                limit,
            });
        }

        let key = QueueKey::of(&record);
        if let Some(deadline) = record.message.expires_at() {
            inner.expiry.insert((deadline, key));
        }
        inner.by_id.insert(record.message_id().to_string(), key);
        inner.records.insert(key, record);
        Ok(())
    }

    /// Prunes expired records, then returns up to `limit` records in
    /// priority order without removing them.
    pub fn peek(&self, limit: usize, channel: Option<&str>, now: Instant) -> Dequeued {
        let mut inner = self.inner.lock();
        let expired = inner.prune(now);
        let records = inner
            .records
            .values()
            .filter(|r| channel.is_none_or(|c| r.channel() == c))
            .take(limit)
            .cloned()
            .collect();
        Dequeued { records, expired }
    }

    pub fn prune(&self, now: Instant) -> Vec<DeliveryRecord> {
        self.inner.lock().prune(now)
    }

    pub fn remove(&self, message_id: &str, now: Instant) -> Removal {
        let mut inner = self.inner.lock();
        let Some(key) = inner.by_id.get(message_id).copied() else {
            return Removal::Missing;
        };
        match inner.take(key) {
            Some(record) if record.message.is_expired(now) => {
                Removal::Expired(record.finish(AckState::Expired))
            }
            Some(record) => Removal::Acknowledged(record.finish(AckState::Acknowledged)),
            None => Removal::Missing,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
pub struct MessageStore {
    queues: DashMap<SubscriberId, Arc<PendingQueue>>,
    max_pending: Option<usize>,
    total: AtomicUsize,
}

impl MessageStore {
    pub fn new(max_pending: Option<usize>) -> Self {
        Self {
            queues: DashMap::new(),
            max_pending,
            total: AtomicUsize::new(0),
        }
    }

    fn existing(&self, subscriber: &str) -> Option<Arc<PendingQueue>> {
        self.queues.get(subscriber).map(|q| q.value().clone())
    }

    /// The queue is written while the map entry is held, so `drop_idle`
    /// can never discard a queue between lookup and insert.
    pub fn enqueue(&self, subscriber: &str, record: DeliveryRecord) -> Result<()> {
        // count before the record is visible so a racing ack never underflows
        self.total.fetch_add(1, Ordering::AcqRel);
        let res = match self.queues.get(subscriber) {
            Some(queue) => queue.enqueue(record, self.max_pending),
            None => self
                .queues
                .entry(subscriber.to_string())
                .or_insert_with(|| Arc::new(PendingQueue::new(subscriber.to_string())))
                .enqueue(record, self.max_pending),
        };
        if res.is_err() {
            self.release(1);
        }
        res
    }

    /// Discards `subscriber`'s queue if it holds nothing. Returns whether a
    /// queue was dropped.
    pub fn drop_idle(&self, subscriber: &str) -> bool {
        self.queues
            .remove_if(subscriber, |_, queue| queue.is_empty())
            .is_some()
    }

    pub fn dequeue(
        &self,
        subscriber: &str,
        limit: usize,
        channel: Option<&str>,
        now: Instant,
    ) -> Dequeued {
        let Some(queue) = self.existing(subscriber) else {
            return Dequeued::default();
        };
        let dequeued = queue.peek(limit, channel, now);
        self.release(dequeued.expired.len());
        dequeued
    }

    pub fn prune(&self, subscriber: &str, now: Instant) -> Vec<DeliveryRecord> {
        let Some(queue) = self.existing(subscriber) else {
            return Vec::new();
        };
        let expired = queue.prune(now);
        self.release(expired.len());
        expired
    }

    pub fn remove(&self, subscriber: &str, message_id: &str, now: Instant) -> Removal {
        let Some(queue) = self.existing(subscriber) else {
            return Removal::Missing;
        };
        let removal = queue.remove(message_id, now);
        if !matches!(removal, Removal::Missing) {
            self.release(1);
        }
        removal
    }

    /// Subscribers that currently own a queue.
    pub fn subscribers(&self) -> Vec<SubscriberId> {
        self.queues.iter().map(|e| e.key().clone()).collect()
    }

    pub fn pending_for(&self, subscriber: &str) -> usize {
        self.existing(subscriber).map_or(0, |q| q.len())
    }

    /// Total pending records across all subscribers.
    pub fn pending(&self) -> usize {
        self.total.load(Ordering::Acquire)
    }

    fn release(&self, n: usize) {
        if n > 0 {
            let _ = self
                .total
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |t| {
                    Some(t.saturating_sub(n))
                });
        }
    }
}
