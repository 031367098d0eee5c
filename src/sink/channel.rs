//! Bounded channel sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use crate::poller::Record;

use super::{Sink, SinkError};

/// Create a sink and the receiver its records arrive on.
pub fn channel(capacity: usize) -> (ChannelSink, mpsc::Receiver<Record>) {
    let (tx, rx) = mpsc::channel(capacity);
    (ChannelSink::new(tx), rx)
}

/// Producer side of a bounded record channel.
///
/// `push` waits for capacity, so a slow consumer slows the host tasks down
/// instead of losing records. Records are only dropped once the receiver
/// is gone.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Record>,
    dropped: Arc<AtomicU64>,
}

impl std::fmt::Debug for ChannelSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSink")
            .field("dropped", &self.dropped_records())
            .finish_non_exhaustive()
    }
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Record>) -> Self {
        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Total records dropped because the receiver was closed.
    pub fn dropped_records(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl Sink for ChannelSink {
    async fn push(&self, record: Record) -> Result<(), SinkError> {
        if self.tx.send(record).await.is_err() {
            if self.dropped.fetch_add(1, Ordering::Relaxed) == 0 {
                tracing::error!("Record consumer is gone, dropping records from now on");
            }
            return Err(SinkError::Closed);
        }
        Ok(())
    }
}
