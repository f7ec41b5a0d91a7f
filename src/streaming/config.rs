//! Target Configuration
//!
//! Loaded once at startup from a JSON document (the Singer convention is a
//! `config.json` passed with `--config`) and immutable afterwards.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Records buffered per stream before a flush is triggered
pub const DEFAULT_BUFFER_SIZE: usize = 1000;

/// Error type for configuration loading
#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read
    Io { path: PathBuf, source: std::io::Error },
    /// Config file is not valid JSON or has wrongly-typed fields
    Json(serde_json::Error),
    /// Config parsed but a value is unusable
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "Cannot read config {}: {}", path.display(), source)
            }
            ConfigError::Json(e) => write!(f, "Invalid config JSON: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Json(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

/// Type of object store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectStoreType {
    /// Amazon S3 or compatible
    #[default]
    S3,
    /// Local filesystem, one directory per bucket
    LocalFs,
    /// In-memory store (for tests and dry runs)
    InMemory,
}

/// S3 connection overrides
///
/// Anything left unset falls back to the standard AWS environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Config {
    /// AWS region
    pub region: Option<String>,
    /// Custom endpoint (for S3-compatible services like MinIO)
    pub endpoint: Option<String>,
}

/// Target configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Destination bucket
    pub bucket_name: String,
    /// Buffered records per stream that trigger a flush
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Storage backend
    #[serde(default)]
    pub store: ObjectStoreType,
    /// Base directory (for `local_fs` store)
    #[serde(default)]
    pub local_path: Option<PathBuf>,
    /// S3 overrides (for `s3` store)
    #[serde(flatten)]
    pub s3: S3Config,
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

impl TargetConfig {
    /// Minimal config for the given bucket, all other fields defaulted
    pub fn new(bucket_name: impl Into<String>) -> Self {
        TargetConfig {
            bucket_name: bucket_name.into(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            store: ObjectStoreType::default(),
            local_path: None,
            s3: S3Config::default(),
        }
    }

    /// Configuration for tests (in-memory store)
    pub fn test(bucket_name: impl Into<String>, buffer_size: usize) -> Self {
        TargetConfig {
            buffer_size,
            store: ObjectStoreType::InMemory,
            ..TargetConfig::new(bucket_name)
        }
    }

    /// Parse and validate a JSON config document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: TargetConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket_name.trim().is_empty() {
            return Err(ConfigError::Invalid("bucket_name must not be empty".into()));
        }
        // Zero is reserved for the end-of-input drain
        if self.buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "buffer_size must be a positive integer".into(),
            ));
        }
        if self.store == ObjectStoreType::LocalFs && self.local_path.is_none() {
            return Err(ConfigError::Invalid(
                "local_path is required when store is local_fs".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_defaults() {
        let config = TargetConfig::from_json(r#"{"bucket_name": "landing"}"#).unwrap();
        assert_eq!(config.bucket_name, "landing");
        assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
        assert_eq!(config.store, ObjectStoreType::S3);
        assert_eq!(config.s3, S3Config::default());
    }

    #[test]
    fn test_full_config() {
        let config = TargetConfig::from_json(
            r#"{
                "bucket_name": "landing",
                "buffer_size": 50,
                "store": "s3",
                "region": "eu-west-1",
                "endpoint": "http://localhost:9000",
                "orchestrator_key": true
            }"#,
        )
        .unwrap();
        assert_eq!(config.buffer_size, 50);
        assert_eq!(config.s3.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.s3.endpoint.as_deref(), Some("http://localhost:9000"));
    }

    #[test]
    fn test_missing_bucket_name() {
        let err = TargetConfig::from_json(r#"{"buffer_size": 10}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_zero_buffer_size_rejected() {
        let err =
            TargetConfig::from_json(r#"{"bucket_name": "b", "buffer_size": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_negative_buffer_size_rejected() {
        let err =
            TargetConfig::from_json(r#"{"bucket_name": "b", "buffer_size": -5}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_local_fs_requires_path() {
        let err = TargetConfig::from_json(r#"{"bucket_name": "b", "store": "local_fs"}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let config = TargetConfig::from_json(
            r#"{"bucket_name": "b", "store": "local_fs", "local_path": "/tmp/out"}"#,
        )
        .unwrap();
        assert_eq!(config.local_path, Some(PathBuf::from("/tmp/out")));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"bucket_name": "landing", "buffer_size": 3}"#).unwrap();

        let config = TargetConfig::load(&path).unwrap();
        assert_eq!(
            config,
            TargetConfig {
                store: ObjectStoreType::S3,
                ..TargetConfig::test("landing", 3)
            }
        );

        let err = TargetConfig::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
