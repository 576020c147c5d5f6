//! Background expiration sweeper.
//!
//! Reads already prune lazily, but a subscriber that stops polling would
//! otherwise keep expired records forever. The sweeper walks every queue on
//! a fixed interval and retires whatever has passed its TTL.
//!
//! A sweep always runs to completion; shutdown is only observed between
//! sweeps.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::broker::engine::Broker;

/// Outcome of one pass over all queues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub queues: usize,
    pub expired: usize,
    pub errors: usize,
    /// Empty queues of subscribers with no subscription left.
    pub dropped: usize,
}

impl Broker {
    /// Prunes every subscriber queue once. A failure on one record is
    /// logged and counted; the sweep carries on with the rest.
    pub fn sweep_expired(&self, now: Instant) -> SweepReport {
        let mut report = SweepReport::default();
        for subscriber in self.store.subscribers() {
            report.queues += 1;
            let expired = self.store.prune(&subscriber, now);
            if !expired.is_empty() {
                report.expired += expired.len();
                report.errors += self.retire_expired(expired);
            }
            if self.drop_idle_queue(&subscriber) {
                report.dropped += 1;
            }
        }
        report
    }
}

#[derive(Debug)]
pub struct ExpirationSweeper {
    broker: Arc<Broker>,
    interval: Duration,
}

impl ExpirationSweeper {
    pub fn new(broker: Arc<Broker>, interval: Duration) -> Self {
        Self { broker, interval }
    }

    pub fn sweep_once(&self) -> SweepReport {
        let report = self.broker.sweep_expired(Instant::now());
        if report.expired > 0 {
            info!(expired = report.expired, queues = report.queues, "swept expired records");
        }
        if report.errors > 0 {
            warn!(errors = report.errors, "sweep finished with errors");
        }
        report
    }

    /// Starts the sweep loop on the current tokio runtime.
    pub fn spawn(self) -> SweeperHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(shutdown_rx));
        SweeperHandle {
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick fires immediately
        ticker.tick().await;

        debug!(interval_ms = self.interval.as_millis() as u64, "sweeper started");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.sweep_once();
                }
            }
        }
        debug!("sweeper stopped");
    }
}

/// Owner of a running sweeper. Dropping the handle also stops the loop,
/// without waiting for it.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stops the loop after any in-progress sweep and waits for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.task.await {
            warn!("sweeper task ended abnormally: {e}");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
