//! S3 Object Store Implementation
//!
//! Provides an S3-compatible object store for production use.
//! Uses the `object_store` crate from the Arrow ecosystem.
//!
//! Supports:
//! - AWS S3
//! - S3-compatible services (MinIO, LocalStack, etc.)
//! - Custom endpoints

use crate::streaming::config::S3Config;
use crate::streaming::object_store::ObjectStore;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore as ObjectStoreTrait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::io::{Error as IoError, ErrorKind, Result as IoResult};
use std::pin::Pin;
use std::sync::Arc;

/// S3 Object Store for production deployments
///
/// The underlying `object_store` client is bound to a single bucket, so one
/// client is built per bucket on first use and cached.
///
/// Credentials and region come from the standard AWS environment variables
/// (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_REGION`, ...), with
/// `S3Config` overriding region and endpoint when set.
#[derive(Clone)]
pub struct S3ObjectStore {
    config: S3Config,
    clients: Arc<RwLock<HashMap<String, Arc<dyn ObjectStoreTrait>>>>,
}

impl S3ObjectStore {
    /// Create a new S3 object store
    pub fn new(config: S3Config) -> Self {
        S3ObjectStore {
            config,
            clients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create from an existing object store bound to `bucket` (for testing)
    pub fn from_store(bucket: &str, store: Arc<dyn ObjectStoreTrait>) -> Self {
        let s3 = S3ObjectStore::new(S3Config::default());
        s3.clients.write().insert(bucket.to_string(), store);
        s3
    }

    fn client(&self, bucket: &str) -> IoResult<Arc<dyn ObjectStoreTrait>> {
        if let Some(client) = self.clients.read().get(bucket) {
            return Ok(Arc::clone(client));
        }

        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
        if let Some(region) = &self.config.region {
            builder = builder.with_region(region);
        }
        // Use custom endpoint for S3-compatible services (MinIO)
        if let Some(endpoint) = &self.config.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store: Arc<dyn ObjectStoreTrait> = Arc::new(builder.build().map_err(|e| {
            IoError::new(
                ErrorKind::InvalidInput,
                format!("Failed to create S3 client for bucket {}: {}", bucket, e),
            )
        })?);

        self.clients
            .write()
            .insert(bucket.to_string(), Arc::clone(&store));
        Ok(store)
    }

    /// Parse `key` as an object path that round-trips byte for byte.
    ///
    /// `ObjectPath::from` would percent-encode or drop parts of input-supplied
    /// stream names; those keys are rejected instead.
    fn object_path(key: &str) -> IoResult<ObjectPath> {
        let path = ObjectPath::parse(key).map_err(|e| {
            IoError::new(
                ErrorKind::InvalidInput,
                format!("Invalid object key {:?}: {}", key, e),
            )
        })?;
        if path.as_ref() != key {
            return Err(IoError::new(
                ErrorKind::InvalidInput,
                format!("Object key {:?} would be stored as {:?}", key, path.as_ref()),
            ));
        }
        Ok(path)
    }

    /// Convert object_store errors to IoError
    fn map_error(err: object_store::Error) -> IoError {
        match &err {
            object_store::Error::NotFound { .. } => {
                IoError::new(ErrorKind::NotFound, err.to_string())
            }
            object_store::Error::Precondition { .. } => {
                IoError::new(ErrorKind::InvalidInput, err.to_string())
            }
            _ => IoError::new(ErrorKind::Other, err.to_string()),
        }
    }
}

impl std::fmt::Debug for S3ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ObjectStore")
            .field("config", &self.config)
            .finish()
    }
}

impl ObjectStore for S3ObjectStore {
    fn put<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        body: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = IoResult<()>> + Send + 'a>> {
        Box::pin(async move {
            let path = Self::object_path(key)?;
            let client = self.client(bucket)?;
            client
                .put(&path, bytes::Bytes::copy_from_slice(body).into())
                .await
                .map_err(Self::map_error)?;
            Ok(())
        })
    }

    fn bucket_exists<'a>(
        &'a self,
        bucket: &'a str,
    ) -> Pin<Box<dyn Future<Output = IoResult<bool>> + Send + 'a>> {
        Box::pin(async move {
            let client = self.client(bucket)?;
            match client.list_with_delimiter(None).await {
                Ok(_) => Ok(true),
                Err(object_store::Error::NotFound { .. }) => Ok(false),
                Err(e) => Err(Self::map_error(e)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    #[tokio::test]
    async fn test_put_through_wrapped_store() {
        let inner = Arc::new(InMemory::new());
        let store = S3ObjectStore::from_store("bucket", inner.clone());

        store
            .put("bucket", "users/2024-01-01T00:00:00.000000", b"{\"id\":1}")
            .await
            .unwrap();

        let got = inner
            .get(&ObjectPath::from("users/2024-01-01T00:00:00.000000"))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(got.as_ref(), b"{\"id\":1}");
    }

    #[tokio::test]
    async fn test_keys_are_written_verbatim() {
        let inner = Arc::new(InMemory::new());
        let store = S3ObjectStore::from_store("bucket", inner.clone());

        store
            .put("bucket", "sales#eu/2024-01-01T00:00:00.000000", b"{}")
            .await
            .unwrap();

        let listed = inner.list_with_delimiter(None).await.unwrap();
        let prefixes: Vec<&str> = listed.common_prefixes.iter().map(|p| p.as_ref()).collect();
        assert_eq!(prefixes, vec!["sales#eu"]);
        assert!(inner
            .head(&ObjectPath::parse("sales#eu/2024-01-01T00:00:00.000000").unwrap())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_unrepresentable_keys_are_rejected() {
        let inner = Arc::new(InMemory::new());
        let store = S3ObjectStore::from_store("bucket", inner.clone());

        for key in [
            "/2024-01-01T00:00:00.000001",
            "a//2024-01-01T00:00:00.000001",
            "../2024-01-01T00:00:00.000001",
            "tab\there/2024-01-01T00:00:00.000001",
        ] {
            let err = store.put("bucket", key, b"{}").await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "key {:?}", key);
        }

        let listed = inner.list_with_delimiter(None).await.unwrap();
        assert!(listed.objects.is_empty());
        assert!(listed.common_prefixes.is_empty());
    }

    #[tokio::test]
    async fn test_bucket_exists_through_wrapped_store() {
        let store = S3ObjectStore::from_store("bucket", Arc::new(InMemory::new()));
        assert!(store.bucket_exists("bucket").await.unwrap());
    }
}
