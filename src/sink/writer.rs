//! JSON-lines output writer.
//!
//! Drains the record channel and writes one JSON object per line. Runs
//! until every [`ChannelSink`](super::ChannelSink) clone has been dropped.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::poller::Record;

use super::SinkError;

/// Consumer side of the record channel.
pub struct JsonLinesWriter<W> {
    rx: mpsc::Receiver<Record>,
    out: W,
    written: u64,
}

impl<W> std::fmt::Debug for JsonLinesWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesWriter")
            .field("written", &self.written)
            .finish_non_exhaustive()
    }
}

impl<W> JsonLinesWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(rx: mpsc::Receiver<Record>, out: W) -> Self {
        Self { rx, out, written: 0 }
    }

    /// Write records until the channel closes.
    ///
    /// Returns the number of records written by this call.
    pub async fn run(&mut self) -> Result<u64, SinkError> {
        tracing::debug!("Record writer started");
        let start = self.written;

        while let Some(record) = self.rx.recv().await {
            let mut line = serde_json::to_vec(&record)?;
            line.push(b'\n');
            self.out.write_all(&line).await?;
            self.out.flush().await?;
            self.written += 1;
        }

        tracing::debug!(records = self.written, "Record writer stopped");
        Ok(self.written - start)
    }

    /// Run on its own task. A write failure is logged as soon as it happens
    /// and cancels `stop`, so polling does not carry on into a dead output.
    pub fn spawn(mut self, stop: CancellationToken) -> JoinHandle<Result<u64, SinkError>>
    where
        W: 'static,
    {
        tokio::spawn(async move {
            let result = self.run().await;
            if let Err(e) = &result {
                tracing::error!(
                    error = %e,
                    written = self.written,
                    "Output writer failed, stopping"
                );
                stop.cancel();
            }
            result
        })
    }

    /// Records written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
