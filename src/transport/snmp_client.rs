// SNMPv2c adapter over the blocking `snmp` client. Every request runs on the
// blocking pool with the session behind a mutex, one request at a time.
//
// The client decodes no v2 exception values: a noSuchObject, noSuchInstance
// or endOfMibView varbind fails PDU decoding and comes back as `Malformed`.
// Walks therefore end when a page leaves the requested subtree.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use tracing::instrument;

use super::{CounterTransport, Oid, SnmpValue, Varbind};
use crate::error::TransportError;

/// Rows requested per GETBULK page while walking a table.
const WALK_MAX_REPETITIONS: u32 = 24;

/// v1-style `noSuchName` error status, still sent by some v2c agents.
const ERROR_STATUS_NO_SUCH_NAME: u32 = 2;

pub struct SnmpTransport {
    agent: String,
    session: Arc<Mutex<::snmp::SyncSession>>,
}

impl SnmpTransport {
    pub fn connect(
        host: &str,
        port: u16,
        community: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let addr = format!("{}:{}", host, port);
        let session = ::snmp::SyncSession::new(addr.as_str(), community.as_bytes(), Some(timeout), 0)
            .map_err(|e| anyhow::anyhow!("snmp session {}: {}", addr, e))?;
        Ok(Self {
            agent: host.to_string(),
            session: Arc::new(Mutex::new(session)),
        })
    }
}

#[async_trait]
impl CounterTransport for SnmpTransport {
    fn agent(&self) -> &str {
        &self.agent
    }

    #[instrument(skip(self, oids), fields(transport = "snmp", operation = "get", oids = oids.len()))]
    async fn get(&self, oids: &[Oid]) -> Result<Vec<Varbind>, TransportError> {
        let session = self.session.clone();
        let oids = oids.to_vec();
        tokio::task::spawn_blocking(move || {
            let mut sess = lock(&session)?;
            let mut out = Vec::with_capacity(oids.len());
            for oid in &oids {
                let pdu = sess.get(oid.parts()).map_err(map_snmp_error)?;
                match pdu.error_status {
                    0 => {}
                    ERROR_STATUS_NO_SUCH_NAME => {
                        return Err(TransportError::NoSuchObject(oid.to_string()));
                    }
                    status => {
                        return Err(TransportError::Malformed(format!(
                            "get {} returned error status {}",
                            oid, status
                        )));
                    }
                }
                let Some((name, value)) = pdu.varbinds.into_iter().next() else {
                    return Err(TransportError::Malformed(format!("get {}: no varbinds", oid)));
                };
                out.push(Varbind {
                    oid: read_oid(&name)?,
                    value: owned_value(&value),
                });
            }
            Ok(out)
        })
        .await
        .map_err(|e| TransportError::Unreachable(format!("snmp task join: {}", e)))?
    }

    fn walk(&self, base: Oid) -> BoxStream<'_, Result<Vec<Varbind>, TransportError>> {
        let session = self.session.clone();
        stream::unfold(Some(base.clone()), move |cursor| {
            let session = session.clone();
            let base = base.clone();
            async move {
                let from = cursor?;
                match bulk_page(session, base, from).await {
                    Ok((batch, finished)) => {
                        if batch.is_empty() {
                            return None;
                        }
                        let next = if finished {
                            None
                        } else {
                            batch.last().map(|vb| vb.oid.clone())
                        };
                        Some((Ok(batch), next))
                    }
                    Err(e) => Some((Err(e), None)),
                }
            }
        })
        .boxed()
    }
}

/// One GETBULK page after `from`. Returns the varbinds still under `base`
/// and whether the walk left the subtree (or the agent stopped advancing).
/// A page may also run past the end of the agent's MIB; that surfaces as a
/// decode error on the final page.
async fn bulk_page(
    session: Arc<Mutex<::snmp::SyncSession>>,
    base: Oid,
    from: Oid,
) -> Result<(Vec<Varbind>, bool), TransportError> {
    tokio::task::spawn_blocking(move || {
        let mut sess = lock(&session)?;
        let pdu = sess
            .getbulk(&[from.parts()], 0, WALK_MAX_REPETITIONS)
            .map_err(map_snmp_error)?;
        if pdu.error_status != 0 {
            return Err(TransportError::Malformed(format!(
                "getbulk {} returned error status {}",
                from, pdu.error_status
            )));
        }
        let mut out = Vec::new();
        let mut finished = false;
        for (name, value) in pdu.varbinds {
            let oid = read_oid(&name)?;
            if !oid.starts_with(&base) || oid <= from {
                finished = true;
                break;
            }
            out.push(Varbind {
                value: owned_value(&value),
                oid,
            });
        }
        Ok((out, finished))
    })
    .await
    .map_err(|e| TransportError::Unreachable(format!("snmp task join: {}", e)))?
}

fn lock(
    session: &Mutex<::snmp::SyncSession>,
) -> Result<std::sync::MutexGuard<'_, ::snmp::SyncSession>, TransportError> {
    session
        .lock()
        .map_err(|e| TransportError::Unreachable(format!("snmp session lock poisoned: {}", e)))
}

fn read_oid(name: &::snmp::ObjectIdentifier<'_>) -> Result<Oid, TransportError> {
    let mut buf = [0u32; 128];
    name.read_name(&mut buf)
        .map(|parts| Oid::new(parts.to_vec()))
        .map_err(|e| TransportError::Malformed(format!("oid: {:?}", e)))
}

fn owned_value(value: &::snmp::Value<'_>) -> SnmpValue {
    use ::snmp::Value;
    match value {
        Value::Integer(v) => SnmpValue::Integer(*v),
        Value::Counter32(v) | Value::Unsigned32(v) | Value::Timeticks(v) => {
            SnmpValue::Counter(u64::from(*v))
        }
        Value::Counter64(v) => SnmpValue::Counter(*v),
        Value::OctetString(bytes) => SnmpValue::OctetString(bytes.to_vec()),
        Value::IpAddress(addr) => SnmpValue::IpAddress(*addr),
        Value::ObjectIdentifier(oid) => read_oid(oid)
            .map(SnmpValue::ObjectId)
            .unwrap_or(SnmpValue::Null),
        _ => SnmpValue::Null,
    }
}

fn map_snmp_error(e: ::snmp::SnmpError) -> TransportError {
    match e {
        ::snmp::SnmpError::ReceiveError => TransportError::Timeout,
        ::snmp::SnmpError::SendError => TransportError::Unreachable("send failed".into()),
        other => TransportError::Malformed(format!("{:?}", other)),
    }
}
