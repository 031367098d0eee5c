//! Record sinks.
//!
//! Host tasks push finished records into a [`Sink`]. Pushes may come from
//! every host task of a cycle at once, so implementations must be safe for
//! concurrent producers.
//!
//! - [`ChannelSink`]: bounded MPSC producer handle, cloneable per task
//! - [`JsonLinesWriter`]: consumer draining the channel into any `AsyncWrite`

mod channel;
mod writer;

use thiserror::Error;

use crate::poller::Record;

pub use channel::{ChannelSink, channel};
pub use writer::JsonLinesWriter;

/// Errors raised while handing records downstream.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Consumer side is gone.
    #[error("sink closed")]
    Closed,

    /// Output could not be written.
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be serialized.
    #[error("sink json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Downstream consumer of emitted records.
#[async_trait::async_trait]
pub trait Sink: Send + Sync + 'static {
    /// Hand one record downstream. Ownership moves to the sink.
    async fn push(&self, record: Record) -> Result<(), SinkError>;
}
