// Interface registry: logical interface name -> ifIndex, plus per-interface
// metadata. The description table is walked once and both positive and
// negative name lookups are cached for the process lifetime. Transport
// failures are never cached, so the next tick retries.

pub mod oids;

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{ResolutionError, TransportError};
use crate::models::{IfIndex, InterfaceMetadata, OperStatus, TargetId};
use crate::scheduler::WallClock;
use crate::transport::{CounterTransport, Oid, SnmpValue};

/// One row of the description table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceEntry {
    pub index: IfIndex,
    pub description: String,
}

#[derive(Default)]
struct RegistryCache {
    /// Walk order is preserved; `resolve_first_active` relies on it.
    table: Option<Vec<InterfaceEntry>>,
    names: HashMap<TargetId, Option<IfIndex>>,
    metadata: HashMap<IfIndex, InterfaceMetadata>,
}

pub struct InterfaceRegistry {
    transport: Arc<dyn CounterTransport>,
    clock: Arc<dyn WallClock>,
    cache: Mutex<RegistryCache>,
}

impl InterfaceRegistry {
    pub fn new(transport: Arc<dyn CounterTransport>, clock: Arc<dyn WallClock>) -> Self {
        Self {
            transport,
            clock,
            cache: Mutex::new(RegistryCache::default()),
        }
    }

    /// Resolves a configured interface.
    ///
    /// `auto` delegates to [`Self::resolve_first_active`]; a plain number is
    /// taken as the index itself. Otherwise the description table is searched
    /// for an exact (case-insensitive) match, then for a whole-word match.
    #[instrument(skip(self, name), fields(registry = "interfaces", operation = "resolve", name = %name))]
    pub async fn resolve(&self, name: &TargetId) -> Result<IfIndex, ResolutionError> {
        if name.is_auto() {
            return self.resolve_first_active().await;
        }

        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.names.get(name) {
            return cached.ok_or_else(|| ResolutionError::NotFound(name.to_string()));
        }

        if let Ok(n) = name.as_str().parse::<u32>() {
            let index = IfIndex(n);
            cache.names.insert(name.clone(), Some(index));
            return Ok(index);
        }

        let table = self.load_table(&mut cache).await?;
        let found = match_description(table, name.as_str());
        cache.names.insert(name.clone(), found);
        match found {
            Some(index) => {
                info!(interface = %name, index = index.0, "Resolved interface");
                Ok(index)
            }
            None => {
                warn!(interface = %name, "Interface not found in description table; target disabled");
                Err(ResolutionError::NotFound(name.to_string()))
            }
        }
    }

    /// Best-effort auto-detect: the first row returned by the description
    /// table walk. No traffic or status check is made, so the choice depends
    /// on the agent's table order.
    #[instrument(skip(self), fields(registry = "interfaces", operation = "resolve_first_active"))]
    pub async fn resolve_first_active(&self) -> Result<IfIndex, ResolutionError> {
        let auto = TargetId::new(crate::models::AUTO_TARGET)
            .map_err(|e| ResolutionError::NotFound(e.0))?;
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.names.get(&auto) {
            return cached.ok_or_else(|| ResolutionError::NotFound(auto.to_string()));
        }

        let table = self.load_table(&mut cache).await?;
        let found = table.first().map(|e| (e.index, e.description.clone()));
        cache.names.insert(auto.clone(), found.as_ref().map(|(i, _)| *i));
        match found {
            Some((index, description)) => {
                info!(
                    index = index.0,
                    description = %description,
                    "Auto-detected interface (first entry in table)"
                );
                Ok(index)
            }
            None => {
                warn!("Interface table is empty; auto-detect disabled");
                Err(ResolutionError::NotFound(auto.to_string()))
            }
        }
    }

    /// Description, speed, MAC, operational status and IPv4 address of an
    /// interface. Cached after the first successful fetch. The IP comes from a
    /// second walk over the address table; if that walk fails the IP is `None`.
    #[instrument(skip(self, index), fields(registry = "interfaces", operation = "get_metadata", index = index.0))]
    pub async fn get_metadata(&self, index: IfIndex) -> Result<InterfaceMetadata, TransportError> {
        if let Some(meta) = self.cache.lock().await.metadata.get(&index) {
            return Ok(meta.clone());
        }

        let values = self
            .transport
            .get(&[
                oids::column(oids::IF_DESCR, index),
                oids::column(oids::IF_HIGH_SPEED, index),
                oids::column(oids::IF_PHYS_ADDRESS, index),
                oids::column(oids::IF_OPER_STATUS, index),
            ])
            .await?;
        let value = |i: usize| values.get(i).map(|vb| &vb.value).filter(|v| !v.is_missing());

        let name = value(0)
            .and_then(SnmpValue::as_text)
            .unwrap_or_else(|| format!("if{}", index.0));
        let speed_bps = value(1)
            .and_then(SnmpValue::as_u64)
            .map(|mbps| mbps.saturating_mul(1_000_000));
        let mac_address = value(2).and_then(format_mac);
        let oper_status = value(3)
            .and_then(SnmpValue::as_i64)
            .map(OperStatus::from_snmp)
            .unwrap_or(OperStatus::Unknown);

        let ip_address = match self.ip_for_index(index).await {
            Ok(ip) => ip,
            Err(e) => {
                debug!(error = %e, index = index.0, "IP address lookup failed; leaving empty");
                None
            }
        };

        let meta = InterfaceMetadata {
            name,
            index,
            ip_address,
            mac_address,
            speed_bps,
            oper_status,
            fetched_at: self.clock.now(),
        };
        self.cache
            .lock()
            .await
            .metadata
            .insert(index, meta.clone());
        Ok(meta)
    }

    /// Metadata fetched so far, ordered by index.
    pub async fn cached_metadata(&self) -> Vec<InterfaceMetadata> {
        let cache = self.cache.lock().await;
        let mut out: Vec<InterfaceMetadata> = cache.metadata.values().cloned().collect();
        out.sort_by_key(|m| m.index);
        out
    }

    async fn load_table<'a>(
        &self,
        cache: &'a mut RegistryCache,
    ) -> Result<&'a [InterfaceEntry], TransportError> {
        if cache.table.is_none() {
            let base = Oid::new(oids::IF_DESCR);
            let mut rows = Vec::new();
            let mut walk = self.transport.walk(base.clone());
            while let Some(batch) = walk.next().await {
                for vb in batch? {
                    let (Some([arc]), Some(description)) = (vb.oid.suffix(&base), vb.value.as_text())
                    else {
                        continue;
                    };
                    rows.push(InterfaceEntry {
                        index: IfIndex(*arc),
                        description,
                    });
                }
            }
            debug!(rows = rows.len(), "Interface description table loaded");
            cache.table = Some(rows);
        }
        Ok(cache.table.as_deref().unwrap_or_default())
    }

    async fn ip_for_index(&self, index: IfIndex) -> Result<Option<String>, TransportError> {
        let base = Oid::new(oids::IP_AD_ENT_IF_INDEX);
        let mut walk = self.transport.walk(base.clone());
        while let Some(batch) = walk.next().await {
            for vb in batch? {
                if vb.value.as_u64() != Some(u64::from(index.0)) {
                    continue;
                }
                if let Some([a, b, c, d]) = vb.oid.suffix(&base) {
                    return Ok(Some(format!("{}.{}.{}.{}", a, b, c, d)));
                }
            }
        }
        Ok(None)
    }
}

/// Exact match first, then a whole-word match; both case-insensitive.
pub fn match_description(table: &[InterfaceEntry], name: &str) -> Option<IfIndex> {
    table
        .iter()
        .find(|e| e.description.eq_ignore_ascii_case(name))
        .or_else(|| table.iter().find(|e| contains_word(&e.description, name)))
        .map(|e| e.index)
}

/// True when `needle` occurs in `haystack` with no alphanumeric character
/// directly before or after it.
fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let hay = haystack.to_ascii_lowercase();
    let needle = needle.to_ascii_lowercase();
    let is_word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric());
    let mut from = 0;
    while let Some(pos) = hay[from..].find(&needle) {
        let start = from + pos;
        let end = start + needle.len();
        let before = hay[..start].chars().next_back();
        let after = hay[end..].chars().next();
        if !is_word(before) && !is_word(after) {
            return true;
        }
        from = start + hay[start..].chars().next().map_or(1, char::len_utf8);
    }
    false
}

fn format_mac(value: &SnmpValue) -> Option<String> {
    let SnmpValue::OctetString(bytes) = value else {
        return None;
    };
    if bytes.is_empty() || bytes.iter().all(|b| *b == 0) {
        return None;
    }
    Some(
        bytes
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":"),
    )
}
