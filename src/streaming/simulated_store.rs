//! Simulated Object Store with Fault Injection
//!
//! DST-compatible wrapper that fails writes either with a seeded
//! probability or deterministically after a fixed number of successful
//! writes. Same seed, same failures.

use crate::streaming::object_store::ObjectStore;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::future::Future;
use std::io::{Error as IoError, ErrorKind, Result as IoResult};
use std::pin::Pin;

/// Configuration for simulated fault injection
#[derive(Debug, Clone, Default)]
pub struct SimulatedStoreConfig {
    /// Probability of PUT operation failure
    pub put_fail_prob: f64,
    /// Fail every PUT once this many have succeeded
    pub fail_after_puts: Option<u64>,
}

impl SimulatedStoreConfig {
    /// No faults - for baseline testing
    pub fn no_faults() -> Self {
        Self::default()
    }

    /// Random write failures at the given rate
    pub fn flaky(put_fail_prob: f64) -> Self {
        SimulatedStoreConfig {
            put_fail_prob,
            ..Self::default()
        }
    }

    /// Writes succeed `n` times, then always fail
    pub fn fail_after(n: u64) -> Self {
        SimulatedStoreConfig {
            fail_after_puts: Some(n),
            ..Self::default()
        }
    }
}

/// Statistics for fault injection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulatedStoreStats {
    pub put_attempts: u64,
    pub put_successes: u64,
    pub put_failures: u64,
    pub bucket_checks: u64,
}

struct SimulatedStoreInner {
    rng: ChaCha8Rng,
    stats: SimulatedStoreStats,
}

/// Simulated object store that wraps another store and injects faults
pub struct SimulatedObjectStore<S: ObjectStore> {
    inner_store: S,
    config: SimulatedStoreConfig,
    state: Mutex<SimulatedStoreInner>,
}

impl<S: ObjectStore> SimulatedObjectStore<S> {
    pub fn new(inner_store: S, seed: u64, config: SimulatedStoreConfig) -> Self {
        SimulatedObjectStore {
            inner_store,
            config,
            state: Mutex::new(SimulatedStoreInner {
                rng: ChaCha8Rng::seed_from_u64(seed),
                stats: SimulatedStoreStats::default(),
            }),
        }
    }

    /// Get current statistics
    pub fn stats(&self) -> SimulatedStoreStats {
        self.state.lock().stats.clone()
    }

    /// Decide whether the next PUT fails, updating counters
    fn next_put_fails(&self) -> bool {
        let mut s = self.state.lock();
        s.stats.put_attempts += 1;

        let exhausted = self
            .config
            .fail_after_puts
            .is_some_and(|n| s.stats.put_successes >= n);
        let random = self.config.put_fail_prob > 0.0 && s.rng.gen_bool(self.config.put_fail_prob);

        if exhausted || random {
            s.stats.put_failures += 1;
            true
        } else {
            false
        }
    }
}

impl<S: ObjectStore> std::fmt::Debug for SimulatedObjectStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedObjectStore")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl<S: ObjectStore> ObjectStore for SimulatedObjectStore<S> {
    fn put<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        body: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = IoResult<()>> + Send + 'a>> {
        Box::pin(async move {
            if self.next_put_fails() {
                return Err(IoError::new(ErrorKind::Other, "simulated put failure"));
            }
            self.inner_store.put(bucket, key, body).await?;
            self.state.lock().stats.put_successes += 1;
            Ok(())
        })
    }

    fn bucket_exists<'a>(
        &'a self,
        bucket: &'a str,
    ) -> Pin<Box<dyn Future<Output = IoResult<bool>> + Send + 'a>> {
        Box::pin(async move {
            self.state.lock().stats.bucket_checks += 1;
            self.inner_store.bucket_exists(bucket).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::object_store::InMemoryObjectStore;

    #[tokio::test]
    async fn test_no_faults_passes_through() {
        let inner = InMemoryObjectStore::with_bucket("b");
        let store = SimulatedObjectStore::new(inner.clone(), 1, SimulatedStoreConfig::no_faults());

        for i in 0..20 {
            store.put("b", &format!("k{}", i), b"v").await.unwrap();
        }
        assert!(store.bucket_exists("b").await.unwrap());

        assert_eq!(inner.len(), 20);
        let stats = store.stats();
        assert_eq!(stats.put_attempts, 20);
        assert_eq!(stats.put_successes, 20);
        assert_eq!(stats.put_failures, 0);
        assert_eq!(stats.bucket_checks, 1);
    }

    #[tokio::test]
    async fn test_fail_after() {
        let inner = InMemoryObjectStore::with_bucket("b");
        let store = SimulatedObjectStore::new(inner.clone(), 1, SimulatedStoreConfig::fail_after(2));

        store.put("b", "k1", b"v").await.unwrap();
        store.put("b", "k2", b"v").await.unwrap();
        assert!(store.put("b", "k3", b"v").await.is_err());
        assert!(store.put("b", "k4", b"v").await.is_err());

        assert_eq!(inner.keys("b"), vec!["k1", "k2"]);
        assert_eq!(store.stats().put_failures, 2);
    }

    #[tokio::test]
    async fn test_same_seed_same_faults() {
        async fn failure_pattern(seed: u64) -> Vec<bool> {
            let store = SimulatedObjectStore::new(
                InMemoryObjectStore::with_bucket("b"),
                seed,
                SimulatedStoreConfig::flaky(0.3),
            );
            let mut pattern = Vec::new();
            for i in 0..50 {
                pattern.push(store.put("b", &format!("k{}", i), b"v").await.is_err());
            }
            pattern
        }

        let a = failure_pattern(42).await;
        let b = failure_pattern(42).await;
        assert_eq!(a, b);
        assert!(a.iter().any(|failed| *failed));
        assert!(a.iter().any(|failed| !*failed));
    }
}
