// Monitoring context: the clock, transports, registry, sink and event bus
// shared by every sampler, plus wiring of their ticks onto a scheduler.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::events::EventBus;
use crate::models::TargetId;
use crate::ping_prober::{PingProber, ProberDeps};
use crate::registry::InterfaceRegistry;
use crate::sampler::{BandwidthSampler, SamplerDeps};
use crate::scheduler::{Boundary, Scheduler, WallClock};
use crate::sink::AggregateSink;
use crate::transport::{CounterTransport, ReachabilityTransport};

#[derive(Clone)]
pub struct MonitorContext {
    pub clock: Arc<dyn WallClock>,
    /// `None` when no network-management agent is configured.
    pub counters: Option<Arc<dyn CounterTransport>>,
    pub reachability: Arc<dyn ReachabilityTransport>,
    pub registry: Option<Arc<InterfaceRegistry>>,
    pub sink: Arc<dyn AggregateSink>,
    pub events: EventBus,
}

impl MonitorContext {
    pub fn new(
        clock: Arc<dyn WallClock>,
        counters: Option<Arc<dyn CounterTransport>>,
        reachability: Arc<dyn ReachabilityTransport>,
        sink: Arc<dyn AggregateSink>,
        events: EventBus,
    ) -> Self {
        let registry = counters
            .as_ref()
            .map(|t| Arc::new(InterfaceRegistry::new(t.clone(), clock.clone())));
        Self {
            clock,
            counters,
            reachability,
            registry,
            sink,
            events,
        }
    }

    /// `None` without a counter transport or with no targets.
    pub fn bandwidth_sampler(&self, targets: Vec<TargetId>) -> Option<BandwidthSampler> {
        if targets.is_empty() {
            return None;
        }
        let transport = self.counters.clone()?;
        let registry = self.registry.clone()?;
        Some(BandwidthSampler::new(
            SamplerDeps {
                transport,
                registry,
                sink: self.sink.clone(),
                events: self.events.clone(),
                clock: self.clock.clone(),
            },
            targets,
        ))
    }

    /// `None` with no hosts.
    pub fn ping_prober(&self, hosts: Vec<TargetId>, timeout: Duration) -> Option<PingProber> {
        if hosts.is_empty() {
            return None;
        }
        Some(PingProber::new(
            ProberDeps {
                transport: self.reachability.clone(),
                sink: self.sink.clone(),
                events: self.events.clone(),
                clock: self.clock.clone(),
            },
            hosts,
            timeout,
        ))
    }
}

/// Samplers that end up running.
#[derive(Clone, Default)]
pub struct Monitors {
    pub bandwidth: Option<Arc<BandwidthSampler>>,
    pub ping: Option<Arc<PingProber>>,
}

/// Second-boundary sampling and `aggregation_secs`-boundary aggregation for
/// every present sampler. Every interface and every host gets its own second
/// loop; ticks of one target never overlap, and a stalled target does not hold
/// back the others.
pub fn start(
    scheduler: &Scheduler,
    monitors: &Monitors,
    aggregation_secs: u64,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();
    let window = Boundary::Every(aggregation_secs);

    if let Some(sampler) = &monitors.bandwidth {
        let targets: Vec<TargetId> = sampler.target_ids().cloned().collect();
        let names: Vec<&str> = targets.iter().map(TargetId::as_str).collect();
        info!(targets = ?names, aggregation_secs, "bandwidth sampling started");

        for target in targets {
            let s = sampler.clone();
            handles.push(scheduler.schedule_recurring("bandwidth_sample", Boundary::Second, move || {
                let s = s.clone();
                let target = target.clone();
                async move {
                    s.sample_one(&target).await;
                    Ok(())
                }
            }));
        }
        let s = sampler.clone();
        handles.push(scheduler.schedule_recurring("bandwidth_aggregate", window, move || {
            let s = s.clone();
            async move {
                s.aggregate_tick().await;
                Ok(())
            }
        }));
    }

    if let Some(prober) = &monitors.ping {
        let hosts: Vec<TargetId> = prober.hosts().cloned().collect();
        let names: Vec<&str> = hosts.iter().map(TargetId::as_str).collect();
        info!(hosts = ?names, aggregation_secs, "ping probing started");

        for host in hosts {
            let p = prober.clone();
            handles.push(scheduler.schedule_recurring("ping_probe", Boundary::Second, move || {
                let p = p.clone();
                let host = host.clone();
                async move {
                    p.probe_one(&host).await;
                    Ok(())
                }
            }));
        }
        let p = prober.clone();
        handles.push(scheduler.schedule_recurring("ping_aggregate", window, move || {
            let p = p.clone();
            async move {
                p.aggregate_tick().await;
                Ok(())
            }
        }));
    }

    handles
}
