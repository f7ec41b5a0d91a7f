//! Run-level error taxonomy
//!
//! Every variant is fatal: the processing loop stops at the first error and
//! hands it back to the caller. Records buffered but not yet flushed at that
//! point are lost; objects already written stay written.

use crate::streaming::object_store::ObjectStoreError;
use crate::streaming::protocol::DecodeError;
use std::io::Error as IoError;

#[derive(Debug)]
pub enum TargetError {
    /// Input line was malformed or violated the protocol
    Decode(DecodeError),
    /// Object write failed (no retry)
    Store {
        bucket: String,
        key: String,
        source: ObjectStoreError,
    },
    /// STATE message could not be written to the output sink
    Output(IoError),
    /// Reading the next input line failed
    Input(IoError),
}

impl TargetError {
    pub fn store(bucket: &str, key: &str, source: IoError) -> Self {
        TargetError::Store {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source: source.into(),
        }
    }
}

impl std::fmt::Display for TargetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetError::Decode(e) => write!(f, "{}", e),
            TargetError::Store {
                bucket,
                key,
                source,
            } => write!(f, "Failed to write s3://{}/{}: {}", bucket, key, source),
            TargetError::Output(e) => write!(f, "Failed to emit state: {}", e),
            TargetError::Input(e) => write!(f, "Failed to read input: {}", e),
        }
    }
}

impl std::error::Error for TargetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TargetError::Decode(e) => Some(e),
            TargetError::Store { source, .. } => Some(source),
            TargetError::Output(e) | TargetError::Input(e) => Some(e),
        }
    }
}

impl From<DecodeError> for TargetError {
    fn from(e: DecodeError) -> Self {
        TargetError::Decode(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    #[test]
    fn test_store_error_display() {
        let err = TargetError::store(
            "landing",
            "users/2024-01-01T00:00:00.000000",
            IoError::new(ErrorKind::PermissionDenied, "access denied"),
        );
        assert!(matches!(
            err,
            TargetError::Store {
                source: ObjectStoreError::PermissionDenied(_),
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "Failed to write s3://landing/users/2024-01-01T00:00:00.000000: \
             Permission denied: access denied"
        );
    }
}
