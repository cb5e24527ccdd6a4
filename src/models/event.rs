// Live-update payloads relayed to dashboard streams

use serde::{Deserialize, Serialize};

use super::{PingAggregate, PingSample, RateSample};

pub const TOPIC_BANDWIDTH_UPDATE: &str = "bandwidth:update";
pub const TOPIC_PING_UPDATE: &str = "ping:update";
pub const TOPIC_PING_AGGREGATE: &str = "ping:aggregate";

/// One event on the bus; serializes as `{"topic": ..., "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", content = "payload")]
pub enum LiveEvent {
    #[serde(rename = "bandwidth:update")]
    Bandwidth(RateSample),
    #[serde(rename = "ping:update")]
    Ping(PingSample),
    #[serde(rename = "ping:aggregate")]
    PingAggregate(PingAggregate),
}

impl LiveEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            LiveEvent::Bandwidth(_) => TOPIC_BANDWIDTH_UPDATE,
            LiveEvent::Ping(_) => TOPIC_PING_UPDATE,
            LiveEvent::PingAggregate(_) => TOPIC_PING_AGGREGATE,
        }
    }
}
