// Interface metadata (slow-changing, fetched once per resolution)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::IfIndex;

/// ifOperStatus, collapsed to the values the dashboard shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperStatus {
    Up,
    Down,
    #[serde(other)]
    Unknown,
}

impl OperStatus {
    /// Map the raw ifOperStatus integer (1 = up, 2 = down).
    pub fn from_snmp(value: i64) -> Self {
        match value {
            1 => OperStatus::Up,
            2 => OperStatus::Down,
            _ => OperStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperStatus::Up => "up",
            OperStatus::Down => "down",
            OperStatus::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "up" => OperStatus::Up,
            "down" => OperStatus::Down,
            _ => OperStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceMetadata {
    pub name: String,
    pub index: IfIndex,
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
    pub speed_bps: Option<u64>,
    pub oper_status: OperStatus,
    pub fetched_at: DateTime<Utc>,
}
