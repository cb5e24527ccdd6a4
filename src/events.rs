// Live-update event bus. Samplers emit; WebSocket relays subscribe.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use crate::models::LiveEvent;

/// Rate limit for the "no subscribers" debug line (emits happen every second).
const NO_RECEIVERS_LOG_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LiveEvent>,
    last_no_receivers_log: Arc<Mutex<Option<Instant>>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            last_no_receivers_log: Arc::new(Mutex::new(None)),
        }
    }

    /// Publishes under the event's topic. Returns how many subscribers got it.
    pub fn emit(&self, event: LiveEvent) -> usize {
        let topic = event.topic();
        match self.tx.send(event) {
            Ok(n) => n,
            Err(_) => {
                if let Ok(mut last) = self.last_no_receivers_log.lock()
                    && last.is_none_or(|t| t.elapsed() >= NO_RECEIVERS_LOG_INTERVAL)
                {
                    tracing::debug!(
                        operation = "emit",
                        topic,
                        "No live subscribers; event dropped"
                    );
                    *last = Some(Instant::now());
                }
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
