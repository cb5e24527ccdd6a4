// Read-back row types for the HTTP layer and their SQLite row parsers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::models::{IfIndex, OperStatus, PingStatus};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BandwidthRecord {
    pub id: i64,
    pub host: String,
    pub interface: String,
    pub in_mbps: f64,
    pub out_mbps: f64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PingRecord {
    pub id: i64,
    pub host: String,
    pub status: PingStatus,
    pub latency_ms: Option<f64>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceInfoRecord {
    pub id: i64,
    pub name: String,
    pub index: IfIndex,
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
    pub speed_bps: Option<u64>,
    pub status: OperStatus,
    pub created_at: DateTime<Utc>,
}

fn millis(row: &SqliteRow, column: &str) -> anyhow::Result<DateTime<Utc>> {
    let ms: i64 = row.try_get(column)?;
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| anyhow::anyhow!("{} out of range: {}", column, ms))
}

pub(super) fn parse_bandwidth_row(row: &SqliteRow) -> anyhow::Result<BandwidthRecord> {
    Ok(BandwidthRecord {
        id: row.try_get("id")?,
        host: row.try_get("host")?,
        interface: row.try_get("interface")?,
        in_mbps: row.try_get("in_mbps")?,
        out_mbps: row.try_get("out_mbps")?,
        window_start: millis(row, "window_start")?,
        window_end: millis(row, "window_end")?,
    })
}

pub(super) fn parse_ping_row(row: &SqliteRow) -> anyhow::Result<PingRecord> {
    let status: String = row.try_get("status")?;
    Ok(PingRecord {
        id: row.try_get("id")?,
        host: row.try_get("host")?,
        status: PingStatus::parse(&status),
        latency_ms: row.try_get("latency_ms")?,
        window_start: millis(row, "window_start")?,
        window_end: millis(row, "window_end")?,
    })
}

pub(super) fn parse_interface_info_row(row: &SqliteRow) -> anyhow::Result<InterfaceInfoRecord> {
    let index: i64 = row.try_get("interface_index")?;
    let speed: Option<i64> = row.try_get("interface_speed")?;
    let status: String = row.try_get("interface_status")?;
    Ok(InterfaceInfoRecord {
        id: row.try_get("id")?,
        name: row.try_get("interface_name")?,
        index: IfIndex(u32::try_from(index)?),
        ip_address: row.try_get("interface_ip")?,
        mac_address: row.try_get("interface_mac")?,
        speed_bps: speed.and_then(|s| u64::try_from(s).ok()),
        status: OperStatus::parse(&status),
        created_at: millis(row, "created_at")?,
    })
}
