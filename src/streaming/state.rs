//! STATE progress emission
//!
//! Each flush is acknowledged with one JSON line on the output sink
//! (stdout in production), flushed immediately so the orchestrator sees
//! progress as soon as the object is durable.

use crate::streaming::protocol::StateMessage;
use std::io::Write;
use tracing::debug;

/// Writes STATE messages to a line-oriented sink
#[derive(Debug)]
pub struct StateEmitter<W: Write> {
    sink: W,
}

impl<W: Write> StateEmitter<W> {
    pub fn new(sink: W) -> Self {
        StateEmitter { sink }
    }

    /// Write one STATE line and flush the sink
    pub fn emit(&mut self, state: StateMessage) -> std::io::Result<()> {
        let line = state.to_line();
        debug!(state = %line, "Emitting state");
        writeln!(self.sink, "{}", line)?;
        self.sink.flush()
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }
}
