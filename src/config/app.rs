//! Poller configuration structures.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::validation::{ConfigError, expand_env_vars};

// =============================================================================
// Constants
// =============================================================================

/// Default polling interval in seconds.
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Default per-request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Default retry count per request.
pub const DEFAULT_RETRIES: u32 = 5;

/// Default number of identifiers fetched per bulk request.
pub const DEFAULT_MAX_IDENTIFIERS_PER_REQUEST: u32 = 20;

/// Default SNMP agent port.
pub const DEFAULT_PORT: u16 = 161;

/// Default grace period for in-flight host tasks after a stop signal.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Default capacity of the record channel feeding the output writer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10_000;

/// Interface-table columns polled when the configuration names none.
pub const DEFAULT_COLUMNS: &[&str] = &[
    "ifIndex",
    "ifDescr",
    "ifAlias",
    "ifSpeed",
    "ifInOctets",
    "ifHCInOctets",
    "ifInUcastPkts",
    "ifHCInUcastPkts",
    "ifInNUcastPkts",
    "ifInDiscards",
    "ifInErrors",
    "ifInUnknownProtos",
    "ifInMulticastPkts",
    "ifHCInMulticastPkts",
    "ifInBroadcastPkts",
    "ifHCInBroadcastPkts",
    "ifOutOctets",
    "ifHCOutOctets",
    "ifOutUcastPkts",
    "ifHCOutUcastPkts",
    "ifOutNUcastPkts",
    "ifOutDiscards",
    "ifOutErrors",
    "ifOutQLen",
    "ifOutMulticastPkts",
    "ifHCOutMulticastPkts",
    "ifOutBroadcastPkts",
    "ifHCOutBroadcastPkts",
    "ifType",
];

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_device() -> String {
    "router".to_string()
}

fn default_event_type() -> String {
    "snmp".to_string()
}

fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_max_identifiers() -> u32 {
    DEFAULT_MAX_IDENTIFIERS_PER_REQUEST
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_community() -> String {
    "public".to_string()
}

fn default_columns() -> Vec<String> {
    DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect()
}

fn default_shutdown_grace() -> Duration {
    DEFAULT_SHUTDOWN_GRACE
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level poller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Seconds between cycle starts (default: 60).
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Device label copied into every record (default: "router").
    #[serde(default = "default_device")]
    pub device: String,

    /// Event type tag copied into every record (default: "snmp").
    #[serde(default = "default_event_type", rename = "type")]
    pub event_type: String,

    /// Hosts to poll, by name or address.
    pub hosts: Vec<String>,

    /// Retries per request (default: 5).
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Per-request timeout in milliseconds (default: 5000).
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Identifiers fetched per bulk request (default: 20).
    #[serde(default = "default_max_identifiers", alias = "max_oids_per_request")]
    pub max_identifiers_per_request: u32,

    /// Agent port (default: 161).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Community string; `${VAR}` references are expanded (default: "public").
    #[serde(default = "default_community")]
    pub community: String,

    /// Static fields merged verbatim into every record.
    #[serde(default)]
    pub custom_fields: BTreeMap<String, serde_json::Value>,

    /// Alias-to-identifier mapping file. The bundled IF-MIB table is used when unset.
    #[serde(default, alias = "oid_table")]
    pub column_table_path: Option<PathBuf>,

    /// Column aliases to poll, in record order.
    #[serde(default = "default_columns", alias = "iftable")]
    pub columns: Vec<String>,

    /// Grace period for in-flight host tasks after stop (default: 5s).
    #[serde(default = "default_shutdown_grace", with = "humantime_serde")]
    pub shutdown_grace: Duration,

    /// Capacity of the record channel (default: 10000).
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// JSON-lines output file. Records go to stdout when unset.
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration with defaults for everything but the host list.
    pub fn with_hosts<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            interval: DEFAULT_INTERVAL_SECS,
            device: default_device(),
            event_type: default_event_type(),
            hosts: hosts.into_iter().map(Into::into).collect(),
            retries: DEFAULT_RETRIES,
            timeout: DEFAULT_TIMEOUT_MS,
            max_identifiers_per_request: DEFAULT_MAX_IDENTIFIERS_PER_REQUEST,
            port: DEFAULT_PORT,
            community: default_community(),
            custom_fields: BTreeMap::new(),
            column_table_path: None,
            columns: default_columns(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            output: None,
        }
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hosts.is_empty() {
            return Err(ConfigError::invalid("at least one host is required"));
        }
        if self.hosts.iter().any(|h| h.trim().is_empty()) {
            return Err(ConfigError::invalid("host entries cannot be empty"));
        }

        if self.interval == 0 {
            return Err(ConfigError::invalid("interval must be at least 1 second"));
        }

        if self.port == 0 {
            return Err(ConfigError::invalid("port must be non-zero"));
        }

        if self.max_identifiers_per_request == 0 {
            return Err(ConfigError::invalid(
                "max_identifiers_per_request must be positive",
            ));
        }

        if self.channel_capacity == 0 {
            return Err(ConfigError::invalid("channel_capacity must be positive"));
        }

        if self.columns.is_empty() {
            return Err(ConfigError::invalid("columns cannot be empty"));
        }
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate column alias: '{}'",
                    column
                )));
            }
        }

        Ok(())
    }

    /// Cycle interval as a `Duration`.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    /// Per-request timeout as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    /// Community string with environment references expanded.
    pub fn community(&self) -> String {
        expand_env_vars(&self.community)
    }
}
