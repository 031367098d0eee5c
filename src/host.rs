//! Polled host definitions.
//!
//! A [`Host`] bundles everything a protocol client needs to open a session
//! against one device. Hosts are built once at startup and never mutated.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::config::AppConfig;

/// Transport settings shared by every host of a run.
#[derive(Clone)]
pub struct HostSettings {
    pub port: u16,
    pub community: String,
    pub timeout: Duration,
    pub retries: u32,
    pub max_identifiers_per_request: u32,
}

impl HostSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            port: config.port,
            community: config.community(),
            timeout: config.request_timeout(),
            retries: config.retries,
            max_identifiers_per_request: config.max_identifiers_per_request,
        }
    }
}

impl std::fmt::Debug for HostSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostSettings")
            .field("port", &self.port)
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .field("max_identifiers_per_request", &self.max_identifiers_per_request)
            .finish_non_exhaustive()
    }
}

/// One configured device with its resolved address.
#[derive(Debug, Clone)]
pub struct Host {
    /// Name as configured; used as the `host` field of emitted records.
    pub name: String,
    /// Address resolved at startup.
    pub address: IpAddr,
    pub settings: HostSettings,
}

impl Host {
    pub fn new(name: impl Into<String>, address: IpAddr, settings: HostSettings) -> Self {
        Self {
            name: name.into(),
            address,
            settings,
        }
    }

    /// Resolve `name` and build the host.
    pub async fn resolve(name: &str, settings: HostSettings) -> Result<Self, std::io::Error> {
        let address = resolve_host(name).await?;
        Ok(Self::new(name, address, settings))
    }

    /// Agent endpoint (address and port).
    pub fn endpoint(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.settings.port)
    }
}

/// Resolve hostname to IP address.
pub async fn resolve_host(host: &str) -> Result<IpAddr, std::io::Error> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    let addrs = tokio::net::lookup_host(format!("{host}:0")).await?;
    addrs
        .into_iter()
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses found"))
}
