//! Broker performance metrics.
//!
//! Every write is a handful of atomic operations; there is no lock on the
//! publish path. Latency samples are kept in nanoseconds in a fixed-size ring
//! so memory stays bounded no matter how long the broker runs.
//! `avg_latency_ms` and the percentiles cover the ring only, while
//! `peak_latency_ms` and `total_latency_ms` are all-time.
//!
//! Window statistics are computed from one pass over the ring slots, so a
//! mean always divides the samples it summed. A read racing a write sees
//! that slot's previous or new value.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricEvent {
    /// A publish completed.
    Sent,
    /// A delivery record was acknowledged.
    Delivered,
    /// A delivery record expired or was refused by backpressure.
    Failed,
}

/// Values owned by other components, sampled when a snapshot is taken.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gauges {
    pub channels: usize,
    pub subscribers: usize,
    pub pending: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub messages_sent: u64,
    pub messages_delivered: u64,
    pub messages_failed: u64,
    pub total_latency_ms: f64,
    pub avg_latency_ms: f64,
    pub peak_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub channels_count: usize,
    pub subscribers_count: usize,
    pub pending_messages: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug)]
pub struct MetricsCollector {
    sent: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    total_latency_ns: AtomicU64,
    peak_latency_ns: AtomicU64,
    window: Box<[AtomicU64]>,
    cursor: AtomicU64,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl MetricsCollector {
    /// `window` is the number of latency samples averaged; clamped to at least 1.
    pub fn new(window: usize) -> Self {
        let window = (0..window.max(1)).map(|_| AtomicU64::new(0)).collect();
        Self {
            sent: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            total_latency_ns: AtomicU64::new(0),
            peak_latency_ns: AtomicU64::new(0),
            window,
            cursor: AtomicU64::new(0),
        }
    }

    pub fn record(&self, event: MetricEvent, latency: Option<Duration>) {
        let counter = match event {
            MetricEvent::Sent => &self.sent,
            MetricEvent::Delivered => &self.delivered,
            MetricEvent::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        if let Some(latency) = latency {
            self.record_latency(latency);
        }
    }

    fn record_latency(&self, latency: Duration) {
        let ns = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        let slot = (self.cursor.fetch_add(1, Ordering::AcqRel) % self.window.len() as u64) as usize;
        self.window[slot].store(ns, Ordering::Release);

        self.total_latency_ns.fetch_add(ns, Ordering::Relaxed);
        self.peak_latency_ns.fetch_max(ns, Ordering::Relaxed);
    }

    pub fn messages_sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn messages_delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn messages_failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Copy of the filled part of the ring.
    fn window_samples(&self) -> Vec<u64> {
        let written = self.cursor.load(Ordering::Acquire);
        let filled = written.min(self.window.len() as u64) as usize;
        self.window[..filled]
            .iter()
            .map(|slot| slot.load(Ordering::Acquire))
            .collect()
    }

    /// Mean over the rolling window, in milliseconds.
    pub fn avg_latency_ms(&self) -> f64 {
        let samples = self.window_samples();
        if samples.is_empty() {
            return 0.0;
        }
        let sum: u128 = samples.iter().map(|&ns| u128::from(ns)).sum();
        sum as f64 / samples.len() as f64 / NANOS_PER_MS
    }

    pub fn peak_latency_ms(&self) -> f64 {
        ns_to_ms(self.peak_latency_ns.load(Ordering::Relaxed))
    }

    /// Nearest-rank percentile over the rolling window, `p` in `0.0..=100.0`.
    pub fn latency_percentile(&self, p: f64) -> f64 {
        let mut values = self.window_samples();
        if values.is_empty() {
            return 0.0;
        }
        values.sort_unstable();

        let n = values.len();
        let rank = ((p.clamp(0.0, 100.0) / 100.0) * n as f64).ceil() as usize;
        ns_to_ms(values[rank.clamp(1, n) - 1])
    }

    pub fn snapshot(&self, gauges: Gauges) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_sent: self.messages_sent(),
            messages_delivered: self.messages_delivered(),
            messages_failed: self.messages_failed(),
            total_latency_ms: ns_to_ms(self.total_latency_ns.load(Ordering::Relaxed)),
            avg_latency_ms: self.avg_latency_ms(),
            peak_latency_ms: self.peak_latency_ms(),
            p99_latency_ms: self.latency_percentile(99.0),
            channels_count: gauges.channels,
            subscribers_count: gauges.subscribers,
            pending_messages: gauges.pending,
            timestamp: Utc::now(),
        }
    }
}

const NANOS_PER_MS: f64 = 1_000_000.0;

fn ns_to_ms(ns: u64) -> f64 {
    ns as f64 / NANOS_PER_MS
}
