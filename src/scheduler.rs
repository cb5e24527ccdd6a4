// Recurring tasks aligned to wall-clock boundaries.
//
// Each task runs in its own loop: sleep until the next boundary strictly after
// "now", run the task to completion, then recompute the next boundary from the
// current time. Runs of one task never overlap; a slow run delays its own next
// run to the first boundary after it finishes. Errors and panics are logged
// and the loop keeps going.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Source of wall-clock time. Swapped out in tests.
pub trait WallClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// When a recurring task fires.
///
/// All variants are aligned to the Unix epoch: `Every(n)` fires at the
/// smallest multiple of `n` seconds since the epoch that is strictly after
/// now. `Minute` and `Hour` are `Every(60)` and `Every(3600)` (UTC, so hour
/// boundaries match local time only for whole-hour offsets).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Second,
    Minute,
    Hour,
    /// Period in seconds; 0 is treated as 1.
    Every(u64),
}

impl Boundary {
    pub fn period_ms(&self) -> i64 {
        let secs = match self {
            Boundary::Second => 1,
            Boundary::Minute => 60,
            Boundary::Hour => 3600,
            Boundary::Every(n) => (*n).max(1),
        };
        (secs as i64).saturating_mul(1000)
    }

    /// First boundary strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let period = self.period_ms();
        let next_ms = (now.timestamp_millis().div_euclid(period) + 1).saturating_mul(period);
        DateTime::from_timestamp_millis(next_ms)
            .unwrap_or_else(|| now + chrono::Duration::milliseconds(period))
    }

    /// Delay from `now` until the next boundary.
    pub fn delay_from(&self, now: DateTime<Utc>) -> Duration {
        (self.next_after(now) - now)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Spawns boundary-aligned recurring tasks and stops them together.
pub struct Scheduler {
    clock: Arc<dyn WallClock>,
    shutdown_tx: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(clock: Arc<dyn WallClock>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self { clock, shutdown_tx }
    }

    pub fn clock(&self) -> Arc<dyn WallClock> {
        self.clock.clone()
    }

    /// Runs `task` at every `boundary` until [`Scheduler::shutdown`].
    /// An in-flight run is allowed to finish; the loop exits while sleeping.
    pub fn schedule_recurring<F, Fut>(
        &self,
        name: &'static str,
        boundary: Boundary,
        mut task: F,
    ) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let clock = self.clock.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            debug!(task = name, ?boundary, "recurring task armed");
            loop {
                if *shutdown_rx.borrow_and_update() {
                    break;
                }
                let delay = boundary.delay_from(clock.now());
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown_rx.changed() => break,
                }

                match AssertUnwindSafe(task()).catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!(task = name, error = %e, "scheduled task failed");
                    }
                    Err(_) => {
                        error!(task = name, "scheduled task panicked");
                    }
                }
            }
            debug!(task = name, "recurring task stopped");
        })
    }

    /// Flips to `true` on [`Scheduler::shutdown`]; for loops not driven by a boundary.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Signals every loop spawned by this scheduler to stop.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }
}
