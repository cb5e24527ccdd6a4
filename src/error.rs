// Error taxonomy for the sampling core. Nothing here is fatal to the process:
// every variant degrades to "skip this tick for this target".

use thiserror::Error;

/// Network-management or probe transport failure. Logged, sample skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport timed out")]
    Timeout,
    #[error("agent unreachable: {0}")]
    Unreachable(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("no such object: {0}")]
    NoSuchObject(String),
}

/// Interface name could not be turned into an index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// Permanent for the process lifetime (cached by the registry).
    #[error("interface '{0}' not found")]
    NotFound(String),
    /// Transient; not cached, retried on the next tick.
    #[error("interface lookup failed: {0}")]
    Transport(#[from] TransportError),
}

/// Reasons a counter reading does not yield a rate. Dropped silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidSample {
    #[error("first reading for target; baseline recorded")]
    Bootstrap,
    #[error("counter went backwards (wrap, reset or reboot); re-baselined")]
    CounterReset,
    #[error("sample window is not positive")]
    EmptyWindow,
    #[error("computed rate is not a finite non-negative number")]
    Anomalous,
}

/// Reachability probe failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("probe timed out")]
    Timeout,
    #[error("host unreachable: {0}")]
    Unreachable(String),
}

/// Persistence sink write failure. The record is lost.
#[derive(Debug, Error)]
#[error("persistence failed: {0}")]
pub struct PersistenceError(#[from] pub anyhow::Error);

impl From<sqlx::Error> for PersistenceError {
    fn from(e: sqlx::Error) -> Self {
        Self(e.into())
    }
}

/// Rejected target identifier (blank, control characters, or too long).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid target id '{0}'")]
pub struct InvalidTargetId(pub String);
