//! Streaming Record Persistence
//!
//! Consumes Singer RECORD messages line by line, buffers them per stream,
//! and writes each full buffer as one object to a bucket. Every write is
//! acknowledged on the output with a STATE message carrying the stream's
//! cumulative persisted count.
//!
//! ## Architecture
//!
//! ```text
//! stdin line → decode_line → StreamBufferManager → ObjectStore
//!                                     ↓
//!                              StateEmitter → stdout
//! ```
//!
//! ## Key Features
//!
//! - **Opaque payloads**: records are persisted exactly as received
//! - **Per-stream batching**: one object per `buffer_size` records
//! - **At-least-once progress**: STATE counts only cover written objects
//! - **Fail-fast**: any decode, storage or output error ends the run

pub mod buffer;
pub mod clock;
pub mod config;
pub mod dst;
pub mod error;
pub mod object_store;
pub mod processor;
pub mod protocol;
#[cfg(feature = "s3")]
pub mod s3_store;
pub mod simulated_store;
pub mod state;

pub use buffer::{FlushResult, StreamBuffer, StreamBufferManager};
pub use clock::{ProductionClock, SimulatedClock, StreamingClock, StreamingTimestamp};
pub use config::{ConfigError, ObjectStoreType, S3Config, TargetConfig, DEFAULT_BUFFER_SIZE};
pub use dst::{
    run_dst_batch, summarize_batch, BufferDSTConfig, BufferDSTHarness, BufferDSTResult,
    BufferWorkload,
};
pub use error::TargetError;
pub use object_store::{InMemoryObjectStore, LocalFsObjectStore, ObjectStore, ObjectStoreError};
pub use processor::{LineProcessor, RunSummary};
pub use protocol::{decode_line, DecodeError, RecordMessage, StateMessage, StateValue};
#[cfg(feature = "s3")]
pub use s3_store::S3ObjectStore;
pub use simulated_store::{SimulatedObjectStore, SimulatedStoreConfig, SimulatedStoreStats};
pub use state::StateEmitter;

use std::io::{Error as IoError, ErrorKind};
use std::sync::Arc;

/// Build the object store selected by the config
pub fn create_store(config: &TargetConfig) -> Result<Arc<dyn ObjectStore>, IoError> {
    match config.store {
        #[cfg(feature = "s3")]
        ObjectStoreType::S3 => Ok(Arc::new(S3ObjectStore::new(config.s3.clone()))),
        #[cfg(not(feature = "s3"))]
        ObjectStoreType::S3 => Err(IoError::new(
            ErrorKind::Unsupported,
            "built without the `s3` feature",
        )),
        ObjectStoreType::LocalFs => {
            let path = config.local_path.clone().ok_or_else(|| {
                IoError::new(ErrorKind::InvalidInput, "local_path is required for local_fs")
            })?;
            Ok(Arc::new(LocalFsObjectStore::new(path)))
        }
        ObjectStoreType::InMemory => Ok(Arc::new(InMemoryObjectStore::with_bucket(
            &config.bucket_name,
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_in_memory_store_has_bucket() {
        let config = TargetConfig::test("landing", 10);
        let store = create_store(&config).unwrap();
        assert!(store.bucket_exists("landing").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_local_fs_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = TargetConfig {
            store: ObjectStoreType::LocalFs,
            local_path: Some(dir.path().to_path_buf()),
            ..TargetConfig::new("landing")
        };
        let store = create_store(&config).unwrap();
        assert!(!store.bucket_exists("landing").await.unwrap());
    }
}
