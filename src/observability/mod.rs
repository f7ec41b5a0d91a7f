//! Observability
//!
//! Structured logging via `tracing`. Everything is written to stderr:
//! stdout is reserved for STATE messages read by the orchestrator.

pub mod config;

pub use config::{LogConfig, LogFormat};

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber
///
/// An unparseable filter falls back to `info`. Calling this twice is
/// harmless; the second call leaves the first subscriber in place.
pub fn init_tracing(config: &LogConfig) {
    let filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(config.with_target);

    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "Tracing subscriber already installed");
    }
}
