// Aggregate record handed to the persistence sink: one row per target per window.

use serde::{Deserialize, Serialize};

use super::{BandwidthAggregate, PingAggregate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AggregateRecord {
    Bandwidth(BandwidthAggregate),
    Ping(PingAggregate),
}

impl AggregateRecord {
    pub fn target_name(&self) -> &str {
        match self {
            AggregateRecord::Bandwidth(b) => b.target.as_str(),
            AggregateRecord::Ping(p) => p.host.as_str(),
        }
    }
}
