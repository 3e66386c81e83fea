//! Cache store contract.
//!
//! One trait covering the three primitives the popularity cache needs from
//! its shared key-value store: whole-listing blobs, set-if-absent leases,
//! and the realtime score sorted set. Components receive the store as an
//! injected `Arc<dyn CacheStore>`; there is no process-wide handle.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Failure talking to the cache store.
///
/// Always recoverable from the caller's point of view: readers degrade to
/// the durable store, writers log and move on.
#[derive(Debug, Error)]
pub enum CacheStoreError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
    #[error("cache store call timed out after {0:?}")]
    Timeout(Duration),
}

impl CacheStoreError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Shared cache store: category blobs, refresh leases, realtime scores.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get_blob(&self, key: &str) -> Result<Option<Vec<u8>>, CacheStoreError>;

    /// Store `value` under `key`. `ttl` of `None` keeps the entry until it
    /// is overwritten or deleted.
    async fn set_blob(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), CacheStoreError>;

    async fn delete_blob(&self, key: &str) -> Result<(), CacheStoreError>;

    /// Set-if-absent with expiry. Returns whether the lease was obtained.
    /// An unreleased lease expires after `ttl`.
    async fn try_acquire_lease(&self, key: &str, ttl: Duration)
    -> Result<bool, CacheStoreError>;

    async fn release_lease(&self, key: &str) -> Result<(), CacheStoreError>;

    /// Increment `member` by `delta`, creating it at `delta` when absent.
    /// Returns the score after the increment.
    async fn zincr(&self, key: &str, member: Uuid, delta: f64) -> Result<f64, CacheStoreError>;

    /// Top `limit` members by descending score.
    async fn zrange_desc(
        &self,
        key: &str,
        limit: usize,
    ) -> Result<Vec<(Uuid, f64)>, CacheStoreError>;

    /// Multiply every score in the set by `factor`.
    async fn zscale(&self, key: &str, factor: f64) -> Result<(), CacheStoreError>;

    /// Remove members whose score is at or below `floor`. Returns the
    /// number of members removed.
    async fn zrem_below(&self, key: &str, floor: f64) -> Result<u64, CacheStoreError>;

    async fn zrem(&self, key: &str, member: Uuid) -> Result<(), CacheStoreError>;
}
