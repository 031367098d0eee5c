//! Protocol client seam and poll errors.

use std::time::Duration;

use crate::host::Host;
use crate::sink::SinkError;

/// Errors that abort one host's contribution to a cycle.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// Session could not be opened.
    #[error("connection failed: {0}")]
    Connect(#[from] std::io::Error),

    /// Every attempt of a request timed out.
    #[error("timeout elapsed after {attempts} attempt(s) of {timeout:?}")]
    Timeout { attempts: u32, timeout: Duration },

    /// The agent answered with an error or a malformed response.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Records could not be handed to the sink.
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

/// Factory for per-host walk sessions.
///
/// The timeout, retry and batch settings carried by [`Host`] are honored by
/// the implementation; callers only see the final outcome.
#[async_trait::async_trait]
pub trait WalkClient: Send + Sync + 'static {
    /// Open a session bound to `host`.
    async fn open(&self, host: &Host) -> Result<Box<dyn WalkSession>, PollError>;
}

/// A session owned by a single host task.
#[async_trait::async_trait]
pub trait WalkSession: Send {
    /// Walk one column identifier and return its values in table-row order.
    async fn walk(&mut self, identifier: &str) -> Result<Vec<String>, PollError>;
}
