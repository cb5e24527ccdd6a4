// Monitored target identity

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InvalidTargetId;

const MAX_TARGET_ID_LEN: usize = 255;

/// Config value that asks the registry to pick an interface itself.
pub const AUTO_TARGET: &str = "auto";

/// Validated target name (interface name, numeric index, `auto`, or ping host).
///
/// Surrounding whitespace is trimmed; inner spaces are kept so multi-word
/// interface descriptions can be configured.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetId(String);

impl TargetId {
    pub fn new(raw: &str) -> Result<Self, InvalidTargetId> {
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || trimmed.len() > MAX_TARGET_ID_LEN
            || trimmed.chars().any(char::is_control)
        {
            return Err(InvalidTargetId(raw.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_auto(&self) -> bool {
        self.0.eq_ignore_ascii_case(AUTO_TARGET)
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TargetId {
    type Err = InvalidTargetId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TargetId {
    type Error = InvalidTargetId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<TargetId> for String {
    fn from(id: TargetId) -> Self {
        id.0
    }
}

/// SNMP interface index (ifIndex).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IfIndex(pub u32);

impl fmt::Display for IfIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Interface,
    Host,
}

/// A thing being sampled. `resolved_index` stays `None` for hosts and for
/// interfaces that have not been resolved yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoredTarget {
    pub name: TargetId,
    pub resolved_index: Option<IfIndex>,
    pub kind: TargetKind,
}

impl MonitoredTarget {
    pub fn interface(name: TargetId) -> Self {
        Self {
            name,
            resolved_index: None,
            kind: TargetKind::Interface,
        }
    }

    pub fn host(name: TargetId) -> Self {
        Self {
            name,
            resolved_index: None,
            kind: TargetKind::Host,
        }
    }
}
