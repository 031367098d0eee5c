//! Configuration errors and value parsing helpers.

use std::sync::LazyLock;
use std::time::Duration;

use regex::{Captures, Regex};
use thiserror::Error;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    ValidationError(String),
}

impl ConfigError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }
}

/// `${NAME}` or `${NAME:-fallback}`.
static ENV_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
        .expect("env reference pattern is valid")
});

/// Parse a grace period or interval given on the command line.
///
/// A bare number is taken as seconds, like `interval` in the config file;
/// anything else goes through humantime (`500ms`, `1m30s`).
///
/// ```
/// use snmp_poller::config::parse_duration;
///
/// assert_eq!(parse_duration("5").unwrap().as_secs(), 5);
/// assert_eq!(parse_duration("1m30s").unwrap().as_secs(), 90);
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| format!("invalid duration '{s}': {e}"))
}

/// Expand `${NAME}` / `${NAME:-fallback}` references from the process environment.
///
/// Used for the community string so credentials can stay out of the file.
pub fn expand_env_vars(input: &str) -> String {
    expand_with(input, |name| std::env::var(name).ok())
}

/// Expand references using `lookup`; unresolved names take their fallback,
/// or the empty string when none is given.
pub(crate) fn expand_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    ENV_REFERENCE
        .replace_all(input, |caps: &Captures| {
            lookup(&caps[1]).unwrap_or_else(|| {
                caps.get(2)
                    .map_or_else(String::new, |m| m.as_str().to_string())
            })
        })
        .into_owned()
}
