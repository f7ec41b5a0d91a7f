//! Logging Configuration
//!
//! All settings are loaded from environment variables for 12-factor compliance.

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Logging configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// `EnvFilter` directive (default: `RUST_LOG`, else `info`)
    pub filter: String,
    /// Output format (default: text)
    pub format: LogFormat,
    /// Include event targets (module paths) in output
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl LogConfig {
    /// Load configuration from environment variables
    ///
    /// - `RUST_LOG`: filter directive
    /// - `SINGER_S3_LOG_FORMAT`: `text` or `json`
    /// - `SINGER_S3_LOG_TARGET`: `true`/`1` to print module paths
    pub fn from_env() -> Self {
        LogConfig {
            filter: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            format: std::env::var("SINGER_S3_LOG_FORMAT")
                .map(|v| Self::parse_format(&v))
                .unwrap_or_default(),
            with_target: std::env::var("SINGER_S3_LOG_TARGET")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }

    fn parse_format(value: &str) -> LogFormat {
        if value.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}
