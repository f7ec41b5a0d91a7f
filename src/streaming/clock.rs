//! Clock Abstraction for Flush Keys
//!
//! Object keys embed the wall-clock instant of each flush. All reads of the
//! clock go through `StreamingClock` so tests can pin and advance time.
//!
//! ## Design Principles (TigerStyle)
//!
//! 1. **Explicit time**: All time operations go through this trait
//! 2. **No hidden state**: Clock state is visible and controllable
//! 3. **Deterministic**: Same inputs produce same outputs in simulation

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Key timestamp layout: ISO-8601 with microsecond resolution, no offset
const KEY_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Timestamp in microseconds since the Unix epoch (UTC)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct StreamingTimestamp(pub u64);

impl StreamingTimestamp {
    pub const ZERO: StreamingTimestamp = StreamingTimestamp(0);

    pub fn from_micros(us: u64) -> Self {
        StreamingTimestamp(us)
    }

    pub fn from_millis(ms: u64) -> Self {
        StreamingTimestamp(ms.saturating_mul(1_000))
    }

    pub fn as_micros(&self) -> u64 {
        self.0
    }

    /// Render as an ISO-8601 timestamp, e.g. `2024-03-01T12:30:05.123456`
    pub fn to_iso8601(&self) -> String {
        let micros = i64::try_from(self.0).unwrap_or(i64::MAX);
        match DateTime::<Utc>::from_timestamp_micros(micros) {
            Some(dt) => dt.format(KEY_TIMESTAMP_FORMAT).to_string(),
            // Out of chrono's range; fall back to the raw epoch value
            None => self.0.to_string(),
        }
    }
}

impl std::ops::Add<Duration> for StreamingTimestamp {
    type Output = StreamingTimestamp;

    fn add(self, rhs: Duration) -> Self::Output {
        StreamingTimestamp(self.0.saturating_add(rhs.as_micros() as u64))
    }
}

impl std::fmt::Display for StreamingTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

/// Clock trait for time operations
///
/// Implementations:
/// - `ProductionClock`: Uses real system time
/// - `SimulatedClock`: Uses controlled virtual time for DST
pub trait StreamingClock: Send + Sync + Clone + 'static {
    /// Get current time
    fn now(&self) -> StreamingTimestamp;
}

/// Production clock using real system time
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductionClock;

impl ProductionClock {
    pub fn new() -> Self {
        ProductionClock
    }
}

impl StreamingClock for ProductionClock {
    fn now(&self) -> StreamingTimestamp {
        let micros = Utc::now().timestamp_micros();
        StreamingTimestamp(u64::try_from(micros).unwrap_or(0))
    }
}

/// Simulated clock for deterministic testing
///
/// Time only advances when explicitly told to via `advance()` or `set()`,
/// or by a fixed step on every read for a `ticking` clock.
/// Clones share the same underlying time.
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    /// Current virtual time in microseconds
    time_us: Arc<AtomicU64>,
    /// Added after every `now()` (0 = frozen)
    tick_us: u64,
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SimulatedClock {
    /// Create a new simulated clock starting at the given time (microseconds)
    pub fn new(start_us: u64) -> Self {
        SimulatedClock {
            time_us: Arc::new(AtomicU64::new(start_us)),
            tick_us: 0,
        }
    }

    /// Clock that moves forward by `tick_us` each time it is read
    pub fn ticking(start_us: u64, tick_us: u64) -> Self {
        SimulatedClock {
            time_us: Arc::new(AtomicU64::new(start_us)),
            tick_us,
        }
    }

    /// Advance time by the given duration
    pub fn advance(&self, duration: Duration) {
        self.time_us
            .fetch_add(duration.as_micros() as u64, Ordering::SeqCst);
    }

    /// Advance time by microseconds
    pub fn advance_us(&self, us: u64) {
        self.time_us.fetch_add(us, Ordering::SeqCst);
    }

    /// Set time to a specific value
    pub fn set(&self, time_us: u64) {
        self.time_us.store(time_us, Ordering::SeqCst);
    }
}

impl StreamingClock for SimulatedClock {
    fn now(&self) -> StreamingTimestamp {
        StreamingTimestamp(self.time_us.fetch_add(self.tick_us, Ordering::SeqCst))
    }
}
