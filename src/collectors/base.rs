//! Shared state and timer loop for all collectors.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::Batch;
use crate::error::CollectorError;

/// Lifecycle of a collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    Created,
    Running,
    Stopped,
}

/// Shortest polling period; shorter intervals are raised to it.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

const CREATED: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

/// Name, interval and cancellation shared by every concrete collector.
pub struct BaseCollector {
    name: String,
    interval: Duration,
    state: AtomicU8,
    started: AtomicBool,
    done: CancellationToken,
}

impl BaseCollector {
    /// Creates the shared state. An `interval` below [`MIN_INTERVAL`]
    /// (including zero) is raised to it, and [`BaseCollector::interval`]
    /// reports the raised value.
    pub fn new(name: impl Into<String>, interval: Duration) -> Self {
        Self {
            name: name.into(),
            interval: interval.max(MIN_INTERVAL),
            state: AtomicU8::new(CREATED),
            started: AtomicBool::new(false),
            done: CancellationToken::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> CollectorState {
        match self.state.load(Ordering::SeqCst) {
            CREATED => CollectorState::Created,
            RUNNING => CollectorState::Running,
            _ => CollectorState::Stopped,
        }
    }

    /// Cancels this collector's loop. Safe to call any number of times.
    pub fn stop(&self) -> Result<(), CollectorError> {
        if !self.done.is_cancelled() {
            info!("Stopping collector '{}'", self.name);
        }
        self.done.cancel();
        // A running loop moves itself to Stopped when it exits.
        let _ = self
            .state
            .compare_exchange(CREATED, STOPPED, Ordering::SeqCst, Ordering::SeqCst);
        Ok(())
    }

    /// Runs the polling loop, calling `collect` once per interval.
    ///
    /// The first tick fires one full interval after the call. The loop ends
    /// with `Ok(())` when either `ctx` or the collector's own stop signal is
    /// cancelled; both are also observed while waiting on a full queue.
    pub async fn run<F>(
        &self,
        ctx: CancellationToken,
        output: mpsc::Sender<Batch>,
        collect: F,
    ) -> Result<(), CollectorError>
    where
        F: Fn() -> Result<Batch, CollectorError> + Send,
    {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(CollectorError::AlreadyStarted(self.name.clone()));
        }
        if self.done.is_cancelled() {
            debug!("Collector '{}' stopped before start", self.name);
            self.state.store(STOPPED, Ordering::SeqCst);
            return Ok(());
        }
        self.state.store(RUNNING, Ordering::SeqCst);

        let period = self.interval;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Collector '{}' running with interval {:?}",
            self.name, self.interval
        );

        let result = loop {
            tokio::select! {
                biased;
                _ = ctx.cancelled() => break Ok(()),
                _ = self.done.cancelled() => break Ok(()),
                _ = ticker.tick() => {}
            }

            let batch = match collect() {
                Ok(batch) => batch,
                Err(e) => {
                    warn!("Error collecting {} metrics: {}", self.name, e);
                    continue;
                }
            };
            debug!(
                "Collector '{}' produced {} points",
                self.name,
                batch.len()
            );

            tokio::select! {
                biased;
                _ = ctx.cancelled() => break Ok(()),
                _ = self.done.cancelled() => break Ok(()),
                sent = output.send(batch) => {
                    if sent.is_err() {
                        break Err(CollectorError::QueueClosed(self.name.clone()));
                    }
                }
            }
        };

        self.state.store(STOPPED, Ordering::SeqCst);
        info!("Collector '{}' stopped", self.name);
        result
    }
}
