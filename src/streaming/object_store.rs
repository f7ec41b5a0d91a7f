//! Object Store Abstraction
//!
//! Provides a trait-based abstraction for the two storage operations the
//! target needs: writing one object into a bucket and probing that a bucket
//! is reachable.
//!
//! Implementations:
//! - `InMemoryObjectStore`: For unit tests and DST
//! - `LocalFsObjectStore`: For development and local testing
//! - `S3ObjectStore`: For production (feature-gated)

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::io::{Error as IoError, ErrorKind, Result as IoResult};
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

/// Error type for object store operations
#[derive(Debug)]
pub enum ObjectStoreError {
    /// Bucket or object not found
    NotFound(String),
    /// I/O error
    Io(IoError),
    /// Permission denied
    PermissionDenied(String),
}

impl std::fmt::Display for ObjectStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectStoreError::NotFound(what) => write!(f, "Not found: {}", what),
            ObjectStoreError::Io(e) => write!(f, "I/O error: {}", e),
            ObjectStoreError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
        }
    }
}

impl std::error::Error for ObjectStoreError {}

impl From<IoError> for ObjectStoreError {
    fn from(e: IoError) -> Self {
        match e.kind() {
            ErrorKind::NotFound => ObjectStoreError::NotFound(e.to_string()),
            ErrorKind::PermissionDenied => ObjectStoreError::PermissionDenied(e.to_string()),
            _ => ObjectStoreError::Io(e),
        }
    }
}

/// Object store abstraction trait
///
/// Any backend satisfying these two calls can sit behind the buffer manager.
/// Failures are returned as `IoError`; callers decide whether they are fatal.
pub trait ObjectStore: Send + Sync + 'static {
    /// Put an object (create or overwrite) into `bucket` under `key`
    fn put<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        body: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = IoResult<()>> + Send + 'a>>;

    /// Check that a bucket exists and is reachable
    fn bucket_exists<'a>(
        &'a self,
        bucket: &'a str,
    ) -> Pin<Box<dyn Future<Output = IoResult<bool>> + Send + 'a>>;
}

impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    fn put<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        body: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = IoResult<()>> + Send + 'a>> {
        (**self).put(bucket, key, body)
    }

    fn bucket_exists<'a>(
        &'a self,
        bucket: &'a str,
    ) -> Pin<Box<dyn Future<Output = IoResult<bool>> + Send + 'a>> {
        (**self).bucket_exists(bucket)
    }
}

// ============================================================================
// InMemoryObjectStore - For tests and DST
// ============================================================================

type Bucket = BTreeMap<String, Vec<u8>>;

/// In-memory object store for unit tests and deterministic simulation
///
/// Buckets must be registered with `create_bucket` before objects can be
/// written to them, mirroring a real bucket that has to exist up front.
#[derive(Debug, Default, Clone)]
pub struct InMemoryObjectStore {
    buckets: Arc<RwLock<HashMap<String, Bucket>>>,
}

impl InMemoryObjectStore {
    /// Create a new in-memory object store with no buckets
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with one empty bucket already registered
    pub fn with_bucket(bucket: &str) -> Self {
        let store = Self::new();
        store.create_bucket(bucket);
        store
    }

    /// Register an empty bucket (no-op if it already exists)
    pub fn create_bucket(&self, bucket: &str) {
        self.buckets.write().entry(bucket.to_string()).or_default();
    }

    /// Get an object's contents (for testing)
    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.buckets.read().get(bucket)?.get(key).cloned()
    }

    /// All keys in a bucket, sorted (for testing)
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .read()
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Total number of stored objects across all buckets (for testing)
    pub fn len(&self) -> usize {
        self.buckets.read().values().map(|b| b.len()).sum()
    }

    /// Check if no objects are stored (for testing)
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn put<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        body: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = IoResult<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut buckets = self.buckets.write();
            let objects = buckets.get_mut(bucket).ok_or_else(|| {
                IoError::new(ErrorKind::NotFound, format!("Bucket not found: {}", bucket))
            })?;
            objects.insert(key.to_string(), body.to_vec());
            Ok(())
        })
    }

    fn bucket_exists<'a>(
        &'a self,
        bucket: &'a str,
    ) -> Pin<Box<dyn Future<Output = IoResult<bool>> + Send + 'a>> {
        Box::pin(async move { Ok(self.buckets.read().contains_key(bucket)) })
    }
}

// ============================================================================
// LocalFsObjectStore - For development
// ============================================================================

/// Local filesystem object store for development and testing
///
/// Each bucket is a directory directly under `base_path`; object keys map
/// to relative paths inside it.
#[derive(Debug, Clone)]
pub struct LocalFsObjectStore {
    base_path: PathBuf,
}

impl LocalFsObjectStore {
    /// Create a new local filesystem object store
    pub fn new(base_path: PathBuf) -> Self {
        LocalFsObjectStore { base_path }
    }

    fn bucket_path(&self, bucket: &str) -> PathBuf {
        self.base_path.join(bucket)
    }

    /// Get the base path (for testing)
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve `key` inside the bucket directory.
    ///
    /// Keys carry input-supplied stream names, so every component must be a
    /// plain name: no root, no `.`/`..`, no empty key.
    fn object_path(bucket_path: &Path, key: &str) -> IoResult<PathBuf> {
        let relative = Path::new(key);
        let mut components = relative.components().peekable();
        let plain = components.peek().is_some()
            && components.all(|c| matches!(c, Component::Normal(_)));
        if !plain || key.starts_with('/') || key.ends_with('/') {
            return Err(IoError::new(
                ErrorKind::InvalidInput,
                format!("Object key is not a relative path: {:?}", key),
            ));
        }
        Ok(bucket_path.join(relative))
    }
}

impl ObjectStore for LocalFsObjectStore {
    fn put<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        body: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = IoResult<()>> + Send + 'a>> {
        Box::pin(async move {
            let bucket_path = self.bucket_path(bucket);
            if !tokio::fs::try_exists(&bucket_path).await? {
                return Err(IoError::new(
                    ErrorKind::NotFound,
                    format!("Bucket not found: {}", bucket_path.display()),
                ));
            }
            let path = Self::object_path(&bucket_path, key)?;
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, body).await
        })
    }

    fn bucket_exists<'a>(
        &'a self,
        bucket: &'a str,
    ) -> Pin<Box<dyn Future<Output = IoResult<bool>> + Send + 'a>> {
        Box::pin(async move {
            match tokio::fs::metadata(self.bucket_path(bucket)).await {
                Ok(meta) => Ok(meta.is_dir()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e),
            }
        })
    }
}
