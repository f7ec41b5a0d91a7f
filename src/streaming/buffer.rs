//! Per-Stream Buffering and Flush
//!
//! Serialized records accumulate per stream name until a stream reaches the
//! flush threshold. A flush writes the whole batch as one newline-joined
//! object and then acknowledges it with a STATE message.
//!
//! ## Per-stream state machine
//!
//! ```text
//! EMPTY → ACCUMULATING (1..threshold-1) → READY (≥ threshold) → flush → EMPTY
//! ```
//!
//! ## Invariants
//!
//! - Records keep arrival order within a stream, across batches.
//! - `flushed_count` only grows, and only after a successful write.
//! - An empty buffer is never written.
//! - A failed write leaves the buffer untouched and is returned to the caller.

use crate::streaming::clock::StreamingClock;
use crate::streaming::error::TargetError;
use crate::streaming::object_store::ObjectStore;
use crate::streaming::protocol::StateMessage;
use crate::streaming::state::StateEmitter;
use std::collections::BTreeMap;
use std::io::Write;
use tracing::{debug, info, warn};

/// Pending and flushed records for one stream
#[derive(Debug, Clone, Default)]
pub struct StreamBuffer {
    /// Serialized payloads in arrival order
    pending: Vec<String>,
    /// Records durably written for this stream during this run
    flushed_count: u64,
    /// Key of the most recent flush, used to flag same-instant collisions
    last_key: Option<String>,
}

impl StreamBuffer {
    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    pub fn flushed_count(&self) -> u64 {
        self.flushed_count
    }
}

/// Outcome of one successful flush
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushResult {
    pub stream: String,
    /// Object key written
    pub key: String,
    /// Records in this batch
    pub records: usize,
    /// Stream total after this batch
    pub cumulative_count: u64,
}

/// Owns every stream's buffer and performs flushes
///
/// Streams are kept in a `BTreeMap`, so multi-stream drains run in
/// stream-name order.
pub struct StreamBufferManager<S: ObjectStore, C: StreamingClock, W: Write> {
    store: S,
    clock: C,
    bucket: String,
    emitter: StateEmitter<W>,
    buffers: BTreeMap<String, StreamBuffer>,
}

impl<S: ObjectStore, C: StreamingClock, W: Write> StreamBufferManager<S, C, W> {
    pub fn new(store: S, clock: C, bucket: impl Into<String>, sink: W) -> Self {
        StreamBufferManager {
            store,
            clock,
            bucket: bucket.into(),
            emitter: StateEmitter::new(sink),
            buffers: BTreeMap::new(),
        }
    }

    /// Append a serialized record, creating the stream's buffer on first use.
    /// Returns the new pending length for the stream.
    pub fn append(&mut self, stream: &str, payload: String) -> usize {
        if let Some(buffer) = self.buffers.get_mut(stream) {
            buffer.pending.push(payload);
            return buffer.pending.len();
        }

        debug!(stream, "New stream");
        self.buffers.insert(
            stream.to_string(),
            StreamBuffer {
                pending: vec![payload],
                ..StreamBuffer::default()
            },
        );
        1
    }

    /// Flush every stream holding at least `threshold` records.
    ///
    /// A threshold of 0 flushes every non-empty stream (end-of-input drain).
    pub async fn check_and_flush(
        &mut self,
        threshold: usize,
    ) -> Result<Vec<FlushResult>, TargetError> {
        let ready: Vec<String> = self
            .buffers
            .iter()
            .filter(|(_, b)| b.pending.len() >= threshold && !b.pending.is_empty())
            .map(|(name, _)| name.clone())
            .collect();

        let mut results = Vec::with_capacity(ready.len());
        for stream in ready {
            if let Some(result) = self.flush_one(&stream).await? {
                results.push(result);
            }
        }
        Ok(results)
    }

    /// Flush everything that is still pending
    pub async fn drain(&mut self) -> Result<Vec<FlushResult>, TargetError> {
        self.check_and_flush(0).await
    }

    /// Write one stream's pending records as a single object.
    ///
    /// Returns `None` for an unknown or empty stream.
    pub async fn flush_one(&mut self, stream: &str) -> Result<Option<FlushResult>, TargetError> {
        let Some(buffer) = self.buffers.get_mut(stream) else {
            return Ok(None);
        };
        if buffer.pending.is_empty() {
            return Ok(None);
        }

        let key = format!("{}/{}", stream, self.clock.now().to_iso8601());
        if buffer.last_key.as_deref() == Some(key.as_str()) {
            // Same stream, same timestamp: the write below replaces the previous batch
            warn!(
                stream,
                key = %key,
                "Flush key collides with previous flush, object will be overwritten"
            );
        }

        let body = buffer.pending.join("\n");
        let records = buffer.pending.len();

        self.store
            .put(&self.bucket, &key, body.as_bytes())
            .await
            .map_err(|e| TargetError::store(&self.bucket, &key, e))?;

        buffer.flushed_count += records as u64;
        buffer.pending.clear();
        buffer.last_key = Some(key.clone());
        let cumulative_count = buffer.flushed_count;

        info!(
            stream,
            key = %key,
            records,
            count = cumulative_count,
            bytes = body.len(),
            "Flushed batch"
        );

        self.emitter
            .emit(StateMessage::new(stream, cumulative_count))
            .map_err(TargetError::Output)?;

        Ok(Some(FlushResult {
            stream: stream.to_string(),
            key,
            records,
            cumulative_count,
        }))
    }

    /// Records written so far for `stream` (0 if never seen)
    pub fn flushed_count(&self, stream: &str) -> u64 {
        self.buffers.get(stream).map_or(0, |b| b.flushed_count)
    }

    /// Records waiting for `stream` (0 if never seen)
    pub fn pending_len(&self, stream: &str) -> usize {
        self.buffers.get(stream).map_or(0, |b| b.pending.len())
    }

    /// Total records waiting across all streams
    pub fn total_pending(&self) -> usize {
        self.buffers.values().map(|b| b.pending.len()).sum()
    }

    pub fn buffer(&self, stream: &str) -> Option<&StreamBuffer> {
        self.buffers.get(stream)
    }

    /// Known stream names, sorted
    pub fn streams(&self) -> impl Iterator<Item = &str> {
        self.buffers.keys().map(String::as_str)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn emitter(&self) -> &StateEmitter<W> {
        &self.emitter
    }
}
