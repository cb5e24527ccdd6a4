// HistoryRepo tests: connect, init, sink inserts, read-back, prune, vacuum

mod common;

use chrono::{DateTime, TimeZone, Utc};
use netwatch::history_repo::HistoryRepo;
use netwatch::models::*;
use netwatch::sink::AggregateSink;
use tempfile::TempDir;

use common::{id, index};

async fn open_repo(dir: &TempDir) -> HistoryRepo {
    let path = dir.path().join("history.db");
    let repo = HistoryRepo::connect(path.to_str().unwrap(), 30).await.unwrap();
    repo.init().await.unwrap();
    repo
}

fn bandwidth(target: &str, avg_in: f64, end: DateTime<Utc>) -> AggregateRecord {
    AggregateRecord::Bandwidth(BandwidthAggregate {
        host: "10.0.0.1".into(),
        target: id(target),
        avg_in_mbps: avg_in,
        avg_out_mbps: avg_in / 2.0,
        samples: 60,
        window_start: end - chrono::Duration::seconds(60),
        window_end: end,
    })
}

fn ping(host: &str, latency: Option<f64>, end: DateTime<Utc>) -> AggregateRecord {
    AggregateRecord::Ping(PingAggregate {
        host: id(host),
        avg_latency_ms: latency,
        status: if latency.is_some() {
            PingStatus::Online
        } else {
            PingStatus::Offline
        },
        probes: 60,
        window_start: end - chrono::Duration::seconds(60),
        window_end: end,
    })
}

fn metadata(i: u32, name: &str, status: OperStatus, at: DateTime<Utc>) -> InterfaceMetadata {
    InterfaceMetadata {
        name: name.into(),
        index: index(i),
        ip_address: Some("192.168.1.1".into()),
        mac_address: None,
        speed_bps: Some(1_000_000_000),
        oper_status: status,
        fetched_at: at,
    }
}

fn recent() -> DateTime<Utc> {
    // Millisecond precision, as stored.
    DateTime::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap()
}

#[tokio::test]
async fn history_repo_connect_and_init() {
    let dir = TempDir::new().unwrap();
    let repo = open_repo(&dir).await;
    // Second init is no-op (IF NOT EXISTS)
    repo.init().await.unwrap();
    assert!(repo.recent_bandwidths(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn connect_creates_missing_parent_dirs() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deeper").join("history.db");
    let repo = HistoryRepo::connect(path.to_str().unwrap(), 30).await.unwrap();
    repo.init().await.unwrap();
    assert!(path.exists());
}

#[tokio::test]
async fn bandwidth_rows_round_trip_newest_first() {
    let dir = TempDir::new().unwrap();
    let repo = open_repo(&dir).await;
    let end = recent();

    repo.insert_aggregate(&bandwidth("eth0", 10.0, end)).await.unwrap();
    repo.insert_aggregate(&bandwidth("eth1", 20.0, end)).await.unwrap();

    let rows = repo.recent_bandwidths(10).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].interface, "eth1");
    assert_eq!(rows[0].host, "10.0.0.1");
    assert_eq!(rows[0].in_mbps, 20.0);
    assert_eq!(rows[0].out_mbps, 10.0);
    assert_eq!(rows[0].window_end, end);
    assert_eq!(rows[0].window_start, end - chrono::Duration::seconds(60));
    assert_eq!(rows[1].interface, "eth0");

    assert_eq!(repo.recent_bandwidths(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn ping_rows_keep_null_latency() {
    let dir = TempDir::new().unwrap();
    let repo = open_repo(&dir).await;
    let end = recent();

    repo.insert_aggregate(&ping("1.1.1.1", Some(12.34), end)).await.unwrap();
    repo.insert_aggregate(&ping("8.8.8.8", None, end)).await.unwrap();

    let rows = repo.recent_pings(10).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].host, "8.8.8.8");
    assert_eq!(rows[0].status, PingStatus::Offline);
    assert_eq!(rows[0].latency_ms, None);
    assert_eq!(rows[1].host, "1.1.1.1");
    assert_eq!(rows[1].status, PingStatus::Online);
    assert_eq!(rows[1].latency_ms, Some(12.34));
}

#[tokio::test]
async fn latest_interface_info_per_index() {
    let dir = TempDir::new().unwrap();
    let repo = open_repo(&dir).await;
    let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

    repo.insert_metadata(&metadata(3, "igb1", OperStatus::Up, t0)).await.unwrap();
    repo.insert_metadata(&metadata(2, "igb0", OperStatus::Up, t0)).await.unwrap();
    repo.insert_metadata(&metadata(2, "igb0", OperStatus::Down, t0 + chrono::Duration::hours(1)))
        .await
        .unwrap();

    let rows = repo.latest_interface_info().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].index, index(2));
    assert_eq!(rows[0].status, OperStatus::Down);
    assert_eq!(rows[0].created_at, t0 + chrono::Duration::hours(1));
    assert_eq!(rows[0].speed_bps, Some(1_000_000_000));
    assert_eq!(rows[0].ip_address.as_deref(), Some("192.168.1.1"));
    assert_eq!(rows[0].mac_address, None);
    assert_eq!(rows[1].index, index(3));
    assert_eq!(rows[1].name, "igb1");
}

#[tokio::test]
async fn prune_removes_rows_past_retention_only() {
    let dir = TempDir::new().unwrap();
    let repo = open_repo(&dir).await;
    let old = Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap();
    let now = recent();

    repo.insert_aggregate(&bandwidth("eth0", 1.0, old)).await.unwrap();
    repo.insert_aggregate(&bandwidth("eth0", 2.0, now)).await.unwrap();
    repo.insert_aggregate(&ping("1.1.1.1", Some(1.0), old)).await.unwrap();
    repo.insert_aggregate(&ping("1.1.1.1", Some(2.0), now)).await.unwrap();
    repo.insert_metadata(&metadata(2, "eth0", OperStatus::Up, old)).await.unwrap();

    let deleted = repo.prune_old_data().await.unwrap();
    assert_eq!(deleted, 2);

    let bw = repo.recent_bandwidths(10).await.unwrap();
    assert_eq!(bw.len(), 1);
    assert_eq!(bw[0].in_mbps, 2.0);
    assert_eq!(repo.recent_pings(10).await.unwrap().len(), 1);
    assert_eq!(repo.latest_interface_info().await.unwrap().len(), 1);

    repo.vacuum().await.unwrap();
}
