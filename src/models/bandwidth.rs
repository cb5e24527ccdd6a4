// Counter readings, derived rates and per-window bandwidth aggregates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TargetId;

/// Raw octet counters read from the agent. Consumed immediately, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSample {
    pub target: TargetId,
    pub in_bytes: u64,
    pub out_bytes: u64,
    pub taken_at: DateTime<Utc>,
}

/// Bandwidth over one sample window, in decimal megabits per second.
/// Both rates are finite and `>= 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateSample {
    pub target: TargetId,
    pub in_mbps: f64,
    pub out_mbps: f64,
    pub taken_at: DateTime<Utc>,
}

/// Mean bandwidth over one aggregation window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandwidthAggregate {
    /// SNMP agent the interface belongs to.
    pub host: String,
    pub target: TargetId,
    pub avg_in_mbps: f64,
    pub avg_out_mbps: f64,
    pub samples: usize,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}
