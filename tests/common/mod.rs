// Shared test helpers: fake transports, a recording sink and test clocks

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};

use netwatch::error::{PersistenceError, ProbeError, TransportError};
use netwatch::models::{AggregateRecord, IfIndex, InterfaceMetadata, TargetId};
use netwatch::registry::oids;
use netwatch::scheduler::WallClock;
use netwatch::sink::AggregateSink;
use netwatch::transport::{CounterTransport, Oid, ReachabilityTransport, SnmpValue, Varbind};

pub const AGENT: &str = "10.0.0.1";

pub fn id(s: &str) -> TargetId {
    TargetId::new(s).unwrap()
}

pub fn ts(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, h, m, s).unwrap()
}

// --- Clocks ---

/// Clock moved by hand.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(by).unwrap();
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap() = to;
    }
}

impl WallClock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Wall clock that follows tokio's (possibly paused) clock from a fixed start.
pub struct VirtualClock {
    base: DateTime<Utc>,
    start: tokio::time::Instant,
}

impl VirtualClock {
    pub fn starting_at(base: DateTime<Utc>) -> Self {
        Self {
            base,
            start: tokio::time::Instant::now(),
        }
    }
}

impl WallClock for VirtualClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = tokio::time::Instant::now() - self.start;
        self.base + chrono::Duration::from_std(elapsed).unwrap()
    }
}

// --- Counter transport ---

/// In-memory agent: an interface table, per-index octet counters, and an
/// address table. Counts walks and gets.
pub struct FakeCounterTransport {
    table: Vec<(u32, String)>,
    addresses: Vec<([u8; 4], u32)>,
    counters: Mutex<HashMap<u32, (u64, u64)>>,
    failing_indexes: Mutex<HashSet<u32>>,
    slow_indexes: Mutex<HashMap<u32, Duration>>,
    fail_walks: AtomicBool,
    pub descr_walks: AtomicUsize,
    pub gets: AtomicUsize,
}

impl FakeCounterTransport {
    pub fn new(table: &[(u32, &str)]) -> Self {
        Self {
            table: table.iter().map(|(i, d)| (*i, d.to_string())).collect(),
            addresses: Vec::new(),
            counters: Mutex::new(HashMap::new()),
            failing_indexes: Mutex::new(HashSet::new()),
            slow_indexes: Mutex::new(HashMap::new()),
            fail_walks: AtomicBool::new(false),
            descr_walks: AtomicUsize::new(0),
            gets: AtomicUsize::new(0),
        }
    }

    pub fn with_address(mut self, ip: [u8; 4], index: u32) -> Self {
        self.addresses.push((ip, index));
        self
    }

    pub fn set_counters(&self, index: u32, in_bytes: u64, out_bytes: u64) {
        self.counters
            .lock()
            .unwrap()
            .insert(index, (in_bytes, out_bytes));
    }

    pub fn fail_index(&self, index: u32, fail: bool) {
        let mut set = self.failing_indexes.lock().unwrap();
        if fail {
            set.insert(index);
        } else {
            set.remove(&index);
        }
    }

    /// Counter reads for `index` take `delay` before answering.
    pub fn slow_index(&self, index: u32, delay: Duration) {
        self.slow_indexes.lock().unwrap().insert(index, delay);
    }

    fn counter_delay(&self, requested: &[Oid]) -> Option<Duration> {
        let slow = self.slow_indexes.lock().unwrap();
        requested
            .iter()
            .filter_map(|oid| {
                let (index, column) = oid.parts().split_last()?;
                let is_counter = column == oids::IF_HC_IN_OCTETS || column == oids::IF_HC_OUT_OCTETS;
                if is_counter { slow.get(index).copied() } else { None }
            })
            .max()
    }

    pub fn fail_walks(&self, fail: bool) {
        self.fail_walks.store(fail, Ordering::SeqCst);
    }

    pub fn walks(&self) -> usize {
        self.descr_walks.load(Ordering::SeqCst)
    }

    fn value_for(&self, oid: &Oid) -> Result<SnmpValue, TransportError> {
        let parts = oid.parts();
        let Some((&index, column)) = parts.split_last() else {
            return Ok(SnmpValue::Null);
        };
        let counters = self.counters.lock().unwrap();
        let value = if column == oids::IF_HC_IN_OCTETS || column == oids::IF_HC_OUT_OCTETS {
            if self.failing_indexes.lock().unwrap().contains(&index) {
                return Err(TransportError::Timeout);
            }
            match counters.get(&index) {
                Some((i, _)) if column == oids::IF_HC_IN_OCTETS => SnmpValue::Counter(*i),
                Some((_, o)) => SnmpValue::Counter(*o),
                None => SnmpValue::Null,
            }
        } else if column == oids::IF_DESCR {
            self.table
                .iter()
                .find(|(i, _)| *i == index)
                .map(|(_, d)| SnmpValue::OctetString(d.clone().into_bytes()))
                .unwrap_or(SnmpValue::Null)
        } else if column == oids::IF_HIGH_SPEED {
            SnmpValue::Counter(1000)
        } else if column == oids::IF_PHYS_ADDRESS {
            SnmpValue::OctetString(vec![0x00, 0x1b, 0x21, 0x00, 0x00, index as u8])
        } else if column == oids::IF_OPER_STATUS {
            SnmpValue::Integer(1)
        } else {
            SnmpValue::Null
        };
        Ok(value)
    }
}

#[async_trait]
impl CounterTransport for FakeCounterTransport {
    fn agent(&self) -> &str {
        AGENT
    }

    async fn get(&self, oids: &[Oid]) -> Result<Vec<Varbind>, TransportError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.counter_delay(oids) {
            tokio::time::sleep(delay).await;
        }
        oids.iter()
            .map(|oid| {
                Ok(Varbind {
                    oid: oid.clone(),
                    value: self.value_for(oid)?,
                })
            })
            .collect()
    }

    fn walk(&self, base: Oid) -> BoxStream<'_, Result<Vec<Varbind>, TransportError>> {
        if base.parts() == oids::IF_DESCR {
            self.descr_walks.fetch_add(1, Ordering::SeqCst);
        }
        if self.fail_walks.load(Ordering::SeqCst) {
            return stream::iter(vec![Err(TransportError::Timeout)]).boxed();
        }
        let rows: Vec<Varbind> = if base.parts() == oids::IF_DESCR {
            self.table
                .iter()
                .map(|(i, d)| Varbind {
                    oid: base.child(*i),
                    value: SnmpValue::OctetString(d.clone().into_bytes()),
                })
                .collect()
        } else if base.parts() == oids::IP_AD_ENT_IF_INDEX {
            self.addresses
                .iter()
                .map(|(ip, i)| Varbind {
                    oid: ip.iter().fold(base.clone(), |oid, b| oid.child(u32::from(*b))),
                    value: SnmpValue::Integer(i64::from(*i)),
                })
                .collect()
        } else {
            Vec::new()
        };
        // Two rows per batch, like a small GETBULK page.
        let batches: Vec<Result<Vec<Varbind>, TransportError>> =
            rows.chunks(2).map(|c| Ok(c.to_vec())).collect();
        stream::iter(batches).boxed()
    }
}

// --- Reachability transport ---

#[derive(Debug, Clone)]
pub enum ProbeScript {
    Reply(f64),
    NoReply,
    /// Never answers; only the caller's timeout ends the probe.
    Hang,
}

pub struct FakePing {
    scripts: Mutex<HashMap<String, ProbeScript>>,
    pub probes: AtomicUsize,
}

impl FakePing {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            probes: AtomicUsize::new(0),
        }
    }

    pub fn script(&self, host: &str, script: ProbeScript) {
        self.scripts
            .lock()
            .unwrap()
            .insert(host.to_string(), script);
    }
}

#[async_trait]
impl ReachabilityTransport for FakePing {
    async fn probe(&self, host: &str, _timeout: Duration) -> Result<f64, ProbeError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(host)
            .cloned()
            .unwrap_or(ProbeScript::NoReply);
        match script {
            ProbeScript::Reply(ms) => Ok(ms),
            ProbeScript::NoReply => Err(ProbeError::Unreachable(host.to_string())),
            ProbeScript::Hang => {
                std::future::pending::<()>().await;
                Err(ProbeError::Timeout)
            }
        }
    }
}

// --- Sink ---

#[derive(Default)]
pub struct RecordingSink {
    pub records: Mutex<Vec<AggregateRecord>>,
    pub metadata: Mutex<Vec<InterfaceMetadata>>,
    fail: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<AggregateRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn metadata(&self) -> Vec<InterfaceMetadata> {
        self.metadata.lock().unwrap().clone()
    }
}

#[async_trait]
impl AggregateSink for RecordingSink {
    async fn insert_aggregate(&self, record: &AggregateRecord) -> Result<(), PersistenceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PersistenceError(anyhow::anyhow!("disk full")));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn insert_metadata(&self, info: &InterfaceMetadata) -> Result<(), PersistenceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PersistenceError(anyhow::anyhow!("disk full")));
        }
        self.metadata.lock().unwrap().push(info.clone());
        Ok(())
    }
}

pub fn index(i: u32) -> IfIndex {
    IfIndex(i)
}
