// Persistence collaborator. Fire-and-forget from the samplers' side: a failed
// write is logged and the record is lost.

use async_trait::async_trait;

use crate::error::PersistenceError;
use crate::models::{AggregateRecord, InterfaceMetadata};

#[async_trait]
pub trait AggregateSink: Send + Sync {
    async fn insert_aggregate(&self, record: &AggregateRecord) -> Result<(), PersistenceError>;

    async fn insert_metadata(&self, info: &InterfaceMetadata) -> Result<(), PersistenceError>;
}
