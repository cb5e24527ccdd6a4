// Reachability prober/aggregator. Same shape as the bandwidth sampler: probe
// every host each second, buffer answered latencies, and fold the buffer into
// one record per host per aggregation window. Each host runs on its own second
// loop (`probe_one`), so a host that never answers only delays itself.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::error::ProbeError;
use crate::events::EventBus;
use crate::models::{AggregateRecord, LiveEvent, PingAggregate, PingSample, PingStatus, TargetId};
use crate::scheduler::WallClock;
use crate::sink::AggregateSink;
use crate::transport::ReachabilityTransport;

struct HostState {
    last: Option<PingSample>,
    latencies: Vec<f64>,
    probes: usize,
    window_start: DateTime<Utc>,
}

pub struct ProberDeps {
    pub transport: Arc<dyn ReachabilityTransport>,
    pub sink: Arc<dyn AggregateSink>,
    pub events: EventBus,
    pub clock: Arc<dyn WallClock>,
}

pub struct PingProber {
    transport: Arc<dyn ReachabilityTransport>,
    sink: Arc<dyn AggregateSink>,
    events: EventBus,
    clock: Arc<dyn WallClock>,
    timeout: Duration,
    hosts: BTreeMap<TargetId, Mutex<HostState>>,
}

impl PingProber {
    pub fn new(deps: ProberDeps, hosts: impl IntoIterator<Item = TargetId>, timeout: Duration) -> Self {
        let now = deps.clock.now();
        let hosts = hosts
            .into_iter()
            .map(|host| {
                let state = HostState {
                    last: None,
                    latencies: Vec::new(),
                    probes: 0,
                    window_start: now,
                };
                (host, Mutex::new(state))
            })
            .collect();
        Self {
            transport: deps.transport,
            sink: deps.sink,
            events: deps.events,
            clock: deps.clock,
            timeout,
            hosts,
        }
    }

    pub fn hosts(&self) -> impl Iterator<Item = &TargetId> {
        self.hosts.keys()
    }

    /// Most recent probe result for a host.
    pub fn last_sample(&self, host: &TargetId) -> Option<PingSample> {
        self.hosts.get(host).and_then(|slot| lock(slot).last.clone())
    }

    /// Probes a single host; `None` if `host` is not configured.
    pub async fn probe_one(&self, host: &TargetId) -> Option<PingSample> {
        let (host, slot) = self.hosts.get_key_value(host)?;
        Some(self.probe_host(host, slot).await)
    }

    /// Probes every host once, concurrently; returns how many answered.
    pub async fn probe_tick(&self) -> usize {
        let samples = join_all(
            self.hosts
                .iter()
                .map(|(host, slot)| self.probe_host(host, slot)),
        )
        .await;
        samples
            .iter()
            .filter(|s| s.status == PingStatus::Online)
            .count()
    }

    async fn probe_host(&self, host: &TargetId, slot: &Mutex<HostState>) -> PingSample {
        // The transport is expected to honour the timeout; the outer bound
        // keeps a misbehaving one from stalling the tick.
        let bound = self.timeout + Duration::from_millis(100);
        let result = match tokio::time::timeout(bound, self.transport.probe(host.as_str(), self.timeout)).await {
            Ok(r) => r,
            Err(_) => Err(ProbeError::Timeout),
        };
        let taken_at = self.clock.now();
        let sample = match result {
            Ok(latency) => PingSample {
                host: host.clone(),
                status: PingStatus::Online,
                latency_ms: Some(latency),
                taken_at,
            },
            Err(e) => {
                debug!(host = %host, error = %e, "Probe got no answer");
                PingSample {
                    host: host.clone(),
                    status: PingStatus::Offline,
                    latency_ms: None,
                    taken_at,
                }
            }
        };

        {
            let mut state = lock(slot);
            state.probes += 1;
            if let Some(latency) = sample.latency_ms {
                state.latencies.push(latency);
            }
            state.last = Some(sample.clone());
        }
        self.events.emit(LiveEvent::Ping(sample.clone()));
        sample
    }

    /// Closes the window for every host that was probed at least once.
    pub async fn aggregate_tick(&self) -> Vec<AggregateRecord> {
        let window_end = self.clock.now();
        let mut aggregates = Vec::new();
        for (host, slot) in &self.hosts {
            let (latencies, probes, window_start) = {
                let mut state = lock(slot);
                let latencies = std::mem::take(&mut state.latencies);
                let probes = std::mem::take(&mut state.probes);
                let window_start = std::mem::replace(&mut state.window_start, window_end);
                (latencies, probes, window_start)
            };
            if probes == 0 {
                continue;
            }
            let (avg_latency_ms, status) = summarize_latencies(&latencies);
            aggregates.push(PingAggregate {
                host: host.clone(),
                avg_latency_ms,
                status,
                probes,
                window_start,
                window_end,
            });
        }

        let mut records = Vec::with_capacity(aggregates.len());
        for aggregate in aggregates {
            self.events.emit(LiveEvent::PingAggregate(aggregate.clone()));
            let record = AggregateRecord::Ping(aggregate);
            if let Err(e) = self.sink.insert_aggregate(&record).await {
                warn!(
                    host = record.target_name(),
                    error = %e,
                    operation = "insert_aggregate",
                    "Ping aggregate lost"
                );
            }
            records.push(record);
        }
        records
    }
}

/// Mean of answered latencies rounded to two decimals, and the window
/// status: online when that mean is positive.
pub fn summarize_latencies(latencies: &[f64]) -> (Option<f64>, PingStatus) {
    if latencies.is_empty() {
        return (None, PingStatus::Offline);
    }
    let mean = latencies.iter().sum::<f64>() / latencies.len() as f64;
    let rounded = (mean * 100.0).round() / 100.0;
    let status = if rounded > 0.0 {
        PingStatus::Online
    } else {
        PingStatus::Offline
    };
    (Some(rounded), status)
}

fn lock(slot: &Mutex<HostState>) -> MutexGuard<'_, HostState> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
