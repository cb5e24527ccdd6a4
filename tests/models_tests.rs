// Model tests: target validation and wire shapes

use chrono::{TimeZone, Utc};
use netwatch::models::*;

#[test]
fn target_id_trims_and_validates() {
    assert_eq!(TargetId::new("  eth0 ").unwrap().as_str(), "eth0");
    assert!(TargetId::new("").is_err());
    assert!(TargetId::new("   ").is_err());
    assert!(TargetId::new("eth\t0").is_err());
    assert!(TargetId::new("eth0\n").is_ok());
    assert_eq!(
        TargetId::new(" Intel(R) Ethernet ").unwrap().as_str(),
        "Intel(R) Ethernet"
    );
    assert!(TargetId::new(&"x".repeat(256)).is_err());
    assert!(TargetId::new(&"x".repeat(255)).is_ok());
}

#[test]
fn auto_is_case_insensitive() {
    assert!(TargetId::new("AUTO").unwrap().is_auto());
    assert!(!TargetId::new("autoconf0").unwrap().is_auto());
}

#[test]
fn target_id_deserializes_with_validation() {
    let ok: TargetId = serde_json::from_str("\"igb0\"").unwrap();
    assert_eq!(ok.to_string(), "igb0");
    assert!(serde_json::from_str::<TargetId>("\"\"").is_err());
}

#[test]
fn oper_status_maps_snmp_values() {
    assert_eq!(OperStatus::from_snmp(1), OperStatus::Up);
    assert_eq!(OperStatus::from_snmp(2), OperStatus::Down);
    assert_eq!(OperStatus::from_snmp(7), OperStatus::Unknown);
    assert_eq!(OperStatus::parse(OperStatus::Down.as_str()), OperStatus::Down);
    let unknown: OperStatus = serde_json::from_str("\"dormant\"").unwrap();
    assert_eq!(unknown, OperStatus::Unknown);
}

#[test]
fn live_event_serializes_with_topic() {
    let event = LiveEvent::Bandwidth(RateSample {
        target: TargetId::new("eth0").unwrap(),
        in_mbps: 1.5,
        out_mbps: 0.25,
        taken_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    });
    assert_eq!(event.topic(), TOPIC_BANDWIDTH_UPDATE);

    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["topic"], "bandwidth:update");
    assert_eq!(json["payload"]["target"], "eth0");
    assert_eq!(json["payload"]["inMbps"], 1.5);
    assert_eq!(json["payload"]["outMbps"], 0.25);

    let back: LiveEvent = serde_json::from_value(json).unwrap();
    assert_eq!(back, event);
}

#[test]
fn ping_sample_serializes_offline_as_null_latency() {
    let event = LiveEvent::Ping(PingSample {
        host: TargetId::new("8.8.8.8").unwrap(),
        status: PingStatus::Offline,
        latency_ms: None,
        taken_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    });
    assert_eq!(event.topic(), TOPIC_PING_UPDATE);
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["topic"], "ping:update");
    assert_eq!(json["payload"]["status"], "offline");
    assert!(json["payload"]["latencyMs"].is_null());
}

#[test]
fn aggregate_record_is_tagged_by_kind() {
    let record = AggregateRecord::Ping(PingAggregate {
        host: TargetId::new("1.1.1.1").unwrap(),
        avg_latency_ms: Some(3.25),
        status: PingStatus::Online,
        probes: 60,
        window_start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        window_end: Utc.with_ymd_and_hms(2024, 1, 1, 0, 1, 0).unwrap(),
    });
    assert_eq!(record.target_name(), "1.1.1.1");
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["kind"], "ping");
    assert_eq!(json["avgLatencyMs"], 3.25);
}

#[test]
fn monitored_target_constructors() {
    let t = MonitoredTarget::interface(TargetId::new("eth0").unwrap());
    assert_eq!(t.kind, TargetKind::Interface);
    assert_eq!(t.resolved_index, None);
    let h = MonitoredTarget::host(TargetId::new("1.1.1.1").unwrap());
    assert_eq!(h.kind, TargetKind::Host);
}
