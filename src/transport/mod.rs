// Transport collaborators: the network-management client that reads interface
// counters and tables, and the reachability probe. The sampling core only sees
// these traits; `snmp_client` and `ping` hold the real adapters.

mod ping;
mod snmp_client;

pub use ping::SystemPing;
pub use snmp_client::SnmpTransport;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::{ProbeError, TransportError};

/// Object identifier, e.g. `1.3.6.1.2.1.2.2.1.2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid(Vec<u32>);

impl Oid {
    pub fn new(parts: impl Into<Vec<u32>>) -> Self {
        Self(parts.into())
    }

    pub fn parts(&self) -> &[u32] {
        &self.0
    }

    /// `self` with one more arc appended (table column -> row instance).
    pub fn child(&self, arc: u32) -> Oid {
        let mut parts = self.0.clone();
        parts.push(arc);
        Oid(parts)
    }

    pub fn starts_with(&self, base: &Oid) -> bool {
        self.0.starts_with(&base.0)
    }

    /// Arcs after `base`, if `self` lies under it.
    pub fn suffix(&self, base: &Oid) -> Option<&[u32]> {
        self.0.strip_prefix(base.0.as_slice())
    }

    pub fn last(&self) -> Option<u32> {
        self.0.last().copied()
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arc in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{}", arc)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for Oid {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('.');
        if trimmed.is_empty() {
            return Err(TransportError::Malformed(format!("empty OID '{}'", s)));
        }
        trimmed
            .split('.')
            .map(|arc| {
                arc.parse::<u32>()
                    .map_err(|_| TransportError::Malformed(format!("bad OID '{}'", s)))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Oid)
    }
}

/// Owned copy of an SNMP value. Counter32, Counter64, Gauge32/Unsigned32 and
/// TimeTicks all land in `Counter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnmpValue {
    Integer(i64),
    Counter(u64),
    OctetString(Vec<u8>),
    IpAddress([u8; 4]),
    ObjectId(Oid),
    /// NULL, or a type the client does not map.
    Null,
}

impl SnmpValue {
    /// Numeric view. Octet strings up to 8 bytes are read big-endian, which is
    /// how some agents hand back 64-bit counters.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            SnmpValue::Counter(v) => Some(*v),
            SnmpValue::Integer(v) => u64::try_from(*v).ok(),
            SnmpValue::OctetString(bytes) if !bytes.is_empty() && bytes.len() <= 8 => {
                Some(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
            }
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SnmpValue::Integer(v) => Some(*v),
            SnmpValue::Counter(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            SnmpValue::OctetString(bytes) => {
                Some(String::from_utf8_lossy(bytes).trim_end_matches('\0').to_string())
            }
            SnmpValue::Integer(v) => Some(v.to_string()),
            SnmpValue::Counter(v) => Some(v.to_string()),
            SnmpValue::IpAddress(a) => Some(format!("{}.{}.{}.{}", a[0], a[1], a[2], a[3])),
            SnmpValue::ObjectId(oid) => Some(oid.to_string()),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, SnmpValue::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Varbind {
    pub oid: Oid,
    pub value: SnmpValue,
}

/// Client for the agent that exposes interface counters and tables.
#[async_trait]
pub trait CounterTransport: Send + Sync {
    /// Agent address, recorded with persisted rows.
    fn agent(&self) -> &str;

    /// One value per requested OID, in request order.
    async fn get(&self, oids: &[Oid]) -> Result<Vec<Varbind>, TransportError>;

    /// Every varbind under `base`, in OID order, delivered in batches. The
    /// stream ends after the last batch or after the first error.
    fn walk(&self, base: Oid) -> BoxStream<'_, Result<Vec<Varbind>, TransportError>>;
}

/// Round-trip probe to a host.
#[async_trait]
pub trait ReachabilityTransport: Send + Sync {
    /// Latency in milliseconds, bounded by `timeout`.
    async fn probe(&self, host: &str, timeout: Duration) -> Result<f64, ProbeError>;
}
