//! SNMPv2c walk client.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use snmp2::{AsyncSession, Oid, Value};

use crate::host::Host;

use super::traits::{PollError, WalkClient, WalkSession};

/// Opens one v2c session per host per cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnmpClient;

impl SnmpClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl WalkClient for SnmpClient {
    async fn open(&self, host: &Host) -> Result<Box<dyn WalkSession>, PollError> {
        let settings = &host.settings;
        let endpoint = host.endpoint();
        let community = settings.community.as_bytes().to_vec();
        let session = AsyncSession::new_v2c(endpoint, &community, 0).await?;

        Ok(Box::new(SnmpSession {
            session,
            endpoint,
            community,
            timeout: settings.timeout,
            attempts: settings.retries.saturating_add(1),
            max_repetitions: settings.max_identifiers_per_request.max(1),
        }))
    }
}

/// GETBULK based subtree walker.
struct SnmpSession {
    session: AsyncSession,
    endpoint: SocketAddr,
    community: Vec<u8>,
    timeout: Duration,
    /// First request plus retries.
    attempts: u32,
    max_repetitions: u32,
}

#[async_trait::async_trait]
impl WalkSession for SnmpSession {
    async fn walk(&mut self, identifier: &str) -> Result<Vec<String>, PollError> {
        let root = parse_oid(identifier)?;
        let mut cursor = root.clone();
        let mut values = Vec::new();

        loop {
            let varbinds = self.request(&cursor).await?;
            if varbinds.is_empty() {
                break;
            }

            for (oid, value) in varbinds {
                // Left the column, or the agent has nothing more
                let Some(value) = value else {
                    return Ok(values);
                };
                if !oid.starts_with(&root) || oid == cursor {
                    return Ok(values);
                }
                values.push(value);
                cursor = oid;
            }
        }

        Ok(values)
    }
}

impl SnmpSession {
    /// One GETBULK with per-attempt timeout.
    ///
    /// Every retry goes out on a fresh socket so that a late reply to an
    /// abandoned attempt can never be read as the answer to a later request.
    async fn request(
        &mut self,
        oid: &Oid<'static>,
    ) -> Result<Vec<(Oid<'static>, Option<String>)>, PollError> {
        for attempt in 1..=self.attempts {
            if attempt > 1 {
                self.reconnect().await?;
            }

            let pending = getbulk(&mut self.session, oid, self.max_repetitions);
            match tokio::time::timeout(self.timeout, pending).await {
                Ok(Ok(varbinds)) => return Ok(varbinds),
                Ok(Err(snmp2::Error::RequestIdMismatch)) => {
                    tracing::trace!(oid = %oid, attempt, "Discarding stale SNMP reply");
                }
                Ok(Err(e)) => {
                    return Err(PollError::Protocol(format!("GETBULK failed: {e:?}")));
                }
                Err(_) => {
                    tracing::trace!(oid = %oid, attempt, "SNMP request timed out");
                }
            }
        }

        Err(PollError::Timeout {
            attempts: self.attempts,
            timeout: self.timeout,
        })
    }

    async fn reconnect(&mut self) -> Result<(), PollError> {
        self.session = AsyncSession::new_v2c(self.endpoint, &self.community, 0).await?;
        Ok(())
    }
}

async fn getbulk(
    session: &mut AsyncSession,
    oid: &Oid<'static>,
    max_repetitions: u32,
) -> Result<Vec<(Oid<'static>, Option<String>)>, snmp2::Error> {
    let pdu = session.getbulk(&[oid], 0, max_repetitions).await?;

    Ok(pdu
        .varbinds
        .map(|(oid, value)| (oid.to_owned(), render_value(&value)))
        .collect())
}

/// Parse a dotted numeric identifier such as `1.3.6.1.2.1.2.2.1.2`.
pub fn parse_oid(s: &str) -> Result<Oid<'static>, PollError> {
    let parts = s
        .trim()
        .trim_start_matches('.')
        .split('.')
        .map(|p| p.parse::<u64>())
        .collect::<Result<Vec<u64>, _>>()
        .map_err(|_| PollError::Protocol(format!("invalid OID '{s}'")))?;

    if parts.len() < 2 {
        return Err(PollError::Protocol(format!("invalid OID '{s}'")));
    }

    Oid::from(&parts).map_err(|e| PollError::Protocol(format!("invalid OID '{s}': {e:?}")))
}

/// Render a varbind value as text; `None` marks the end of the walk.
pub fn render_value(value: &Value<'_>) -> Option<String> {
    let rendered = match value {
        Value::EndOfMibView | Value::NoSuchObject | Value::NoSuchInstance => return None,
        Value::OctetString(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        Value::Integer(n) => n.to_string(),
        Value::Counter32(n) | Value::Unsigned32(n) | Value::Timeticks(n) => n.to_string(),
        Value::Counter64(n) => n.to_string(),
        Value::IpAddress(octets) => Ipv4Addr::from(*octets).to_string(),
        Value::ObjectIdentifier(oid) => oid.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Null => String::new(),
        other => format!("{other:?}"),
    };
    Some(rendered)
}
