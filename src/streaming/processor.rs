//! Line Processor
//!
//! Pulls lines from the input, decodes each one, routes records into the
//! buffer manager and checks the flush threshold after every record. End of
//! input is the only graceful exit: it drains every remaining buffer.
//!
//! ```text
//! line → decode → append → check_and_flush(buffer_size) → next line
//!                                              EOF → drain()
//! ```

use crate::streaming::buffer::StreamBufferManager;
use crate::streaming::clock::StreamingClock;
use crate::streaming::config::TargetConfig;
use crate::streaming::error::TargetError;
use crate::streaming::object_store::ObjectStore;
use crate::streaming::protocol::decode_line;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{error, info};

/// Totals for a completed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Input lines consumed
    pub lines: u64,
    /// Records accepted
    pub records: u64,
    /// Objects written
    pub flushes: u64,
}

pub struct LineProcessor<S: ObjectStore, C: StreamingClock, W: Write> {
    manager: StreamBufferManager<S, C, W>,
    buffer_size: usize,
    summary: RunSummary,
}

impl<S: ObjectStore, C: StreamingClock, W: Write> LineProcessor<S, C, W> {
    pub fn new(manager: StreamBufferManager<S, C, W>, buffer_size: usize) -> Self {
        debug_assert!(buffer_size > 0, "buffer_size 0 is reserved for the final drain");
        LineProcessor {
            manager,
            buffer_size,
            summary: RunSummary::default(),
        }
    }

    /// Build a processor writing to the configured bucket
    pub fn from_config(config: &TargetConfig, store: S, clock: C, sink: W) -> Self {
        let manager = StreamBufferManager::new(store, clock, config.bucket_name.clone(), sink);
        Self::new(manager, config.buffer_size)
    }

    /// Handle one input line. Returns the serialized record payload.
    pub async fn process_line(&mut self, line: &str) -> Result<String, TargetError> {
        self.summary.lines += 1;
        let line = line.strip_suffix('\r').unwrap_or(line);

        let message = decode_line(line).map_err(|e| {
            error!(line_number = self.summary.lines, error = %e, "Rejecting input line");
            e
        })?;

        self.manager.append(&message.stream, message.payload.clone());
        self.summary.records += 1;

        let flushed = self.manager.check_and_flush(self.buffer_size).await?;
        self.summary.flushes += flushed.len() as u64;

        Ok(message.payload)
    }

    /// Consume `reader` to end of input, then flush everything left.
    pub async fn run<R: AsyncBufRead + Unpin>(
        &mut self,
        reader: R,
    ) -> Result<RunSummary, TargetError> {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await.map_err(TargetError::Input)? {
            self.process_line(&line).await?;
        }
        self.finish().await
    }

    /// End of input: flush every non-empty buffer regardless of threshold
    pub async fn finish(&mut self) -> Result<RunSummary, TargetError> {
        let drained = self.manager.drain().await?;
        self.summary.flushes += drained.len() as u64;

        info!(
            lines = self.summary.lines,
            records = self.summary.records,
            flushes = self.summary.flushes,
            "Input exhausted, all buffers flushed"
        );
        Ok(self.summary)
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    pub fn manager(&self) -> &StreamBufferManager<S, C, W> {
        &self.manager
    }
}
