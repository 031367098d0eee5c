//! Configuration module for the poller.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Polling settings (interval, hosts, columns)
//! - Transport settings passed to the protocol client (port, community, timeout, retries)
//! - Record metadata (device label, type tag, custom fields)

mod app;
mod validation;

pub use app::AppConfig;
pub use validation::{ConfigError, expand_env_vars, parse_duration};

pub use app::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_COLUMNS, DEFAULT_INTERVAL_SECS,
    DEFAULT_MAX_IDENTIFIERS_PER_REQUEST, DEFAULT_PORT, DEFAULT_RETRIES, DEFAULT_SHUTDOWN_GRACE,
    DEFAULT_TIMEOUT_MS,
};
