// Bandwidth sampler/aggregator.
//
// Second tick: for every configured interface, resolve it (once), read the
// octet counters, turn the pair of readings into a rate, emit it live and
// buffer it. Aggregation tick: average each non-empty buffer into one record
// for the sink, then clear every buffer. Each target runs on its own second
// loop (`sample_one`), so a slow agent reply only delays that target.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::counter::CounterDelta;
use crate::error::{ResolutionError, TransportError};
use crate::events::EventBus;
use crate::models::{
    AggregateRecord, BandwidthAggregate, CounterSample, IfIndex, InterfaceMetadata, LiveEvent,
    MonitoredTarget, RateSample, TargetId,
};
use crate::registry::{InterfaceRegistry, oids};
use crate::scheduler::WallClock;
use crate::sink::AggregateSink;
use crate::transport::{CounterTransport, Varbind};

/// Per-target lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplerPhase {
    Uninitialized,
    Resolving,
    /// Resolved; the next reading becomes the counter baseline.
    Bootstrapping,
    Sampling,
    /// Name not found; stays disabled until restart.
    Disabled,
}

/// What happened to one target in one second tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOutcome {
    Sampled,
    /// Reading taken but no rate (bootstrap or counter reset).
    Invalid,
    Failed,
    Disabled,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SampleTickReport {
    pub sampled: usize,
    pub invalid: usize,
    pub failed: usize,
    pub disabled: usize,
}

struct TargetState {
    target: MonitoredTarget,
    /// Name carried by rates and rows. The configured name, except for `auto`,
    /// which takes the resolved interface's description.
    recorded_as: TargetId,
    phase: SamplerPhase,
    delta: CounterDelta,
    buffer: Vec<RateSample>,
    window_start: DateTime<Utc>,
}

/// Collaborators for the sampler.
pub struct SamplerDeps {
    pub transport: Arc<dyn CounterTransport>,
    pub registry: Arc<InterfaceRegistry>,
    pub sink: Arc<dyn AggregateSink>,
    pub events: EventBus,
    pub clock: Arc<dyn WallClock>,
}

pub struct BandwidthSampler {
    transport: Arc<dyn CounterTransport>,
    registry: Arc<InterfaceRegistry>,
    sink: Arc<dyn AggregateSink>,
    events: EventBus,
    clock: Arc<dyn WallClock>,
    targets: BTreeMap<TargetId, Mutex<TargetState>>,
}

impl BandwidthSampler {
    /// Duplicate target ids collapse into one.
    pub fn new(deps: SamplerDeps, targets: impl IntoIterator<Item = TargetId>) -> Self {
        let now = deps.clock.now();
        let targets = targets
            .into_iter()
            .map(|id| {
                let state = TargetState {
                    target: MonitoredTarget::interface(id.clone()),
                    recorded_as: id.clone(),
                    phase: SamplerPhase::Uninitialized,
                    delta: CounterDelta::new(),
                    buffer: Vec::new(),
                    window_start: now,
                };
                (id, Mutex::new(state))
            })
            .collect();
        Self {
            transport: deps.transport,
            registry: deps.registry,
            sink: deps.sink,
            events: deps.events,
            clock: deps.clock,
            targets,
        }
    }

    pub fn target_ids(&self) -> impl Iterator<Item = &TargetId> {
        self.targets.keys()
    }

    pub fn phase(&self, id: &TargetId) -> Option<SamplerPhase> {
        self.targets.get(id).map(|slot| lock(slot).phase)
    }

    pub fn target(&self, id: &TargetId) -> Option<MonitoredTarget> {
        self.targets.get(id).map(|slot| lock(slot).target.clone())
    }

    pub fn buffered(&self, id: &TargetId) -> usize {
        self.targets.get(id).map_or(0, |slot| lock(slot).buffer.len())
    }

    /// One sampling pass for a single target; `None` if `id` is not configured.
    pub async fn sample_one(&self, id: &TargetId) -> Option<TargetOutcome> {
        let (id, slot) = self.targets.get_key_value(id)?;
        Some(self.sample_target(id, slot).await)
    }

    /// One sampling pass over every target, run concurrently.
    pub async fn sample_tick(&self) -> SampleTickReport {
        let outcomes = join_all(
            self.targets
                .iter()
                .map(|(id, slot)| self.sample_target(id, slot)),
        )
        .await;

        let mut report = SampleTickReport::default();
        for outcome in outcomes {
            match outcome {
                TargetOutcome::Sampled => report.sampled += 1,
                TargetOutcome::Invalid => report.invalid += 1,
                TargetOutcome::Failed => report.failed += 1,
                TargetOutcome::Disabled => report.disabled += 1,
            }
        }
        report
    }

    async fn sample_target(&self, id: &TargetId, slot: &Mutex<TargetState>) -> TargetOutcome {
        let (phase, resolved, recorded_as) = {
            let state = lock(slot);
            (state.phase, state.target.resolved_index, state.recorded_as.clone())
        };
        if phase == SamplerPhase::Disabled {
            return TargetOutcome::Disabled;
        }

        let (index, recorded_as) = match resolved {
            Some(index) => (index, recorded_as),
            None => match self.resolve_target(id, slot).await {
                Some(resolved) => resolved,
                None => {
                    return match lock(slot).phase {
                        SamplerPhase::Disabled => TargetOutcome::Disabled,
                        _ => TargetOutcome::Failed,
                    };
                }
            },
        };

        let reading = match self.read_counters(&recorded_as, index).await {
            Ok(r) => r,
            Err(e) => {
                warn!(
                    interface = %id,
                    index = index.0,
                    error = %e,
                    operation = "read_counters",
                    "Counter read failed; sample skipped"
                );
                return TargetOutcome::Failed;
            }
        };

        let mut state = lock(slot);
        match state.delta.observe(reading) {
            Ok(rate) => {
                state.phase = SamplerPhase::Sampling;
                self.events.emit(LiveEvent::Bandwidth(rate.clone()));
                state.buffer.push(rate);
                TargetOutcome::Sampled
            }
            Err(reason) => {
                debug!(interface = %id, reason = %reason, "Sample dropped");
                state.phase = SamplerPhase::Sampling;
                TargetOutcome::Invalid
            }
        }
    }

    /// Resolves the target's index and records its metadata once. Returns
    /// the index and the name to record under, or `None` when the tick should
    /// skip this target.
    async fn resolve_target(
        &self,
        id: &TargetId,
        slot: &Mutex<TargetState>,
    ) -> Option<(IfIndex, TargetId)> {
        lock(slot).phase = SamplerPhase::Resolving;
        match self.registry.resolve(id).await {
            Ok(index) => {
                let meta = self.record_metadata(id, index).await;
                let recorded_as = if id.is_auto() {
                    let name = meta
                        .and_then(|m| TargetId::new(&m.name).ok())
                        .or_else(|| TargetId::new(&index.to_string()).ok())
                        .unwrap_or_else(|| id.clone());
                    info!(interface = %id, index = index.0, recorded_as = %name, "Auto-detected interface");
                    name
                } else {
                    id.clone()
                };
                {
                    let mut state = lock(slot);
                    state.target.resolved_index = Some(index);
                    state.recorded_as = recorded_as.clone();
                    state.phase = SamplerPhase::Bootstrapping;
                    state.delta.reset();
                }
                Some((index, recorded_as))
            }
            Err(ResolutionError::NotFound(name)) => {
                info!(interface = %id, name = %name, "Target disabled until restart");
                lock(slot).phase = SamplerPhase::Disabled;
                None
            }
            Err(ResolutionError::Transport(e)) => {
                warn!(
                    interface = %id,
                    error = %e,
                    operation = "resolve",
                    "Interface resolution failed; retrying next tick"
                );
                lock(slot).phase = SamplerPhase::Uninitialized;
                None
            }
        }
    }

    async fn record_metadata(&self, id: &TargetId, index: IfIndex) -> Option<InterfaceMetadata> {
        let meta = match self.registry.get_metadata(index).await {
            Ok(m) => m,
            Err(e) => {
                warn!(interface = %id, index = index.0, error = %e, "Interface metadata fetch failed");
                return None;
            }
        };
        if let Err(e) = self.sink.insert_metadata(&meta).await {
            warn!(interface = %id, error = %e, operation = "insert_metadata", "Interface metadata not saved");
        }
        Some(meta)
    }

    async fn read_counters(&self, id: &TargetId, index: IfIndex) -> Result<CounterSample, TransportError> {
        let values = self.transport.get(&oids::octet_counters(index)).await?;
        let taken_at = self.clock.now();
        Ok(CounterSample {
            target: id.clone(),
            in_bytes: counter_value(&values, 0, index)?,
            out_bytes: counter_value(&values, 1, index)?,
            taken_at,
        })
    }

    /// Closes the current window for every target: non-empty buffers become
    /// aggregate records handed to the sink; every buffer is cleared.
    pub async fn aggregate_tick(&self) -> Vec<AggregateRecord> {
        let window_end = self.clock.now();
        let mut records = Vec::new();
        for slot in self.targets.values() {
            let (samples, window_start, recorded_as) = {
                let mut state = lock(slot);
                let samples = std::mem::take(&mut state.buffer);
                let window_start = std::mem::replace(&mut state.window_start, window_end);
                (samples, window_start, state.recorded_as.clone())
            };
            let Some((avg_in_mbps, avg_out_mbps)) = average_rates(&samples) else {
                continue;
            };
            records.push(AggregateRecord::Bandwidth(BandwidthAggregate {
                host: self.transport.agent().to_string(),
                target: recorded_as,
                avg_in_mbps,
                avg_out_mbps,
                samples: samples.len(),
                window_start,
                window_end,
            }));
        }

        for record in &records {
            if let Err(e) = self.sink.insert_aggregate(record).await {
                warn!(
                    interface = record.target_name(),
                    error = %e,
                    operation = "insert_aggregate",
                    "Bandwidth aggregate lost"
                );
            }
        }
        if !records.is_empty() {
            debug!(records = records.len(), "Bandwidth window aggregated");
        }
        records
    }
}

/// Arithmetic mean of in/out rates; `None` for an empty window.
pub fn average_rates(samples: &[RateSample]) -> Option<(f64, f64)> {
    if samples.is_empty() {
        return None;
    }
    let n = samples.len() as f64;
    let total_in: f64 = samples.iter().map(|s| s.in_mbps).sum();
    let total_out: f64 = samples.iter().map(|s| s.out_mbps).sum();
    Some((total_in / n, total_out / n))
}

/// Octet counter at `pos` of a counter GET. An absent or NULL value means the
/// agent has no such instance; any other non-numeric value is malformed.
fn counter_value(values: &[Varbind], pos: usize, index: IfIndex) -> Result<u64, TransportError> {
    let column = if pos == 0 { "ifHCInOctets" } else { "ifHCOutOctets" };
    match values.get(pos).map(|vb| &vb.value) {
        None => Err(TransportError::NoSuchObject(format!("{}.{}", column, index))),
        Some(value) if value.is_missing() => {
            Err(TransportError::NoSuchObject(format!("{}.{}", column, index)))
        }
        Some(value) => value.as_u64().ok_or_else(|| {
            TransportError::Malformed(format!("{}.{} is not a counter: {:?}", column, index, value))
        }),
    }
}

fn lock(slot: &Mutex<TargetState>) -> MutexGuard<'_, TargetState> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
