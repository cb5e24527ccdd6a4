// Reachability samples and per-window latency aggregates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TargetId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PingStatus {
    Online,
    Offline,
}

impl PingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PingStatus::Online => "online",
            PingStatus::Offline => "offline",
        }
    }

    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("online") {
            PingStatus::Online
        } else {
            PingStatus::Offline
        }
    }
}

/// One probe result; `latency_ms` is `None` when the host did not answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingSample {
    pub host: TargetId,
    pub status: PingStatus,
    pub latency_ms: Option<f64>,
    pub taken_at: DateTime<Utc>,
}

/// Mean latency of online probes over one aggregation window.
/// `avg_latency_ms` is `None` when no probe in the window got an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingAggregate {
    pub host: TargetId,
    pub avg_latency_ms: Option<f64>,
    pub status: PingStatus,
    pub probes: usize,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}
