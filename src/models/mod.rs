// Domain models

mod aggregation;
mod bandwidth;
mod event;
mod interface;
mod ping;
mod target;

pub use aggregation::AggregateRecord;
pub use bandwidth::{BandwidthAggregate, CounterSample, RateSample};
pub use event::{LiveEvent, TOPIC_BANDWIDTH_UPDATE, TOPIC_PING_AGGREGATE, TOPIC_PING_UPDATE};
pub use interface::{InterfaceMetadata, OperStatus};
pub use ping::{PingAggregate, PingSample, PingStatus};
pub use target::{AUTO_TARGET, IfIndex, MonitoredTarget, TargetId, TargetKind};
