//! In-process cache store adapter.
//!
//! Backs tests and single-node deployments with the same contract the
//! Redis adapter implements: TTL-aware blobs, set-if-absent leases, and a
//! sorted score set. Expiry is checked lazily on access.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use super::store::{CacheStore, CacheStoreError};

struct StoredBlob {
    bytes: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredBlob {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// In-memory [`CacheStore`].
pub struct MemoryCacheStore {
    blobs: DashMap<String, StoredBlob>,
    leases: DashMap<String, Instant>,
    scores: DashMap<String, HashMap<Uuid, f64>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self {
            blobs: DashMap::new(),
            leases: DashMap::new(),
            scores: DashMap::new(),
        }
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get_blob(&self, key: &str) -> Result<Option<Vec<u8>>, CacheStoreError> {
        if let Some(entry) = self.blobs.get(key) {
            if !entry.is_expired() {
                return Ok(Some(entry.bytes.clone()));
            }
        }
        self.blobs.remove_if(key, |_, stored| stored.is_expired());
        Ok(None)
    }

    async fn set_blob(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), CacheStoreError> {
        self.blobs.insert(
            key.to_string(),
            StoredBlob {
                bytes: value.to_vec(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn delete_blob(&self, key: &str) -> Result<(), CacheStoreError> {
        self.blobs.remove(key);
        Ok(())
    }

    async fn try_acquire_lease(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<bool, CacheStoreError> {
        let deadline = Instant::now() + ttl;
        match self.leases.entry(key.to_string()) {
            Entry::Occupied(mut held) => {
                if Instant::now() >= *held.get() {
                    held.insert(deadline);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(deadline);
                Ok(true)
            }
        }
    }

    async fn release_lease(&self, key: &str) -> Result<(), CacheStoreError> {
        self.leases.remove(key);
        Ok(())
    }

    async fn zincr(&self, key: &str, member: Uuid, delta: f64) -> Result<f64, CacheStoreError> {
        let mut set = self.scores.entry(key.to_string()).or_default();
        let score = set.entry(member).or_insert(0.0);
        *score += delta;
        Ok(*score)
    }

    async fn zrange_desc(
        &self,
        key: &str,
        limit: usize,
    ) -> Result<Vec<(Uuid, f64)>, CacheStoreError> {
        let Some(set) = self.scores.get(key) else {
            return Ok(Vec::new());
        };
        let mut members: Vec<(Uuid, f64)> = set.iter().map(|(id, score)| (*id, *score)).collect();
        members.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        members.truncate(limit);
        Ok(members)
    }

    async fn zscale(&self, key: &str, factor: f64) -> Result<(), CacheStoreError> {
        if let Some(mut set) = self.scores.get_mut(key) {
            for score in set.values_mut() {
                *score *= factor;
            }
        }
        Ok(())
    }

    async fn zrem_below(&self, key: &str, floor: f64) -> Result<u64, CacheStoreError> {
        let Some(mut set) = self.scores.get_mut(key) else {
            return Ok(0);
        };
        let before = set.len();
        set.retain(|_, score| *score > floor);
        Ok((before - set.len()) as u64)
    }

    async fn zrem(&self, key: &str, member: Uuid) -> Result<(), CacheStoreError> {
        if let Some(mut set) = self.scores.get_mut(key) {
            set.remove(&member);
        }
        Ok(())
    }
}
