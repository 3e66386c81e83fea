//! Realtime ranking scores.
//!
//! Thin wrapper over the cache store's sorted set: interactions increment a
//! post's score, the decay job periodically multiplies every score by a
//! factor below one and prunes entries at or below the floor. The set is
//! always a superset of the realtime listing, which is rebuilt from its
//! top-N.

use std::sync::Arc;

use metrics::counter;
use tracing::debug;
use uuid::Uuid;

use super::keys::REALTIME_SCORES_KEY;
use super::store::{CacheStore, CacheStoreError};

const METRIC_DECAY_PRUNED: &str = "vetrina_decay_pruned_total";

pub struct RealtimeScores {
    store: Arc<dyn CacheStore>,
}

impl RealtimeScores {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Bump `post_id` by `delta` (a like or view event).
    pub async fn increment(&self, post_id: Uuid, delta: f64) -> Result<f64, CacheStoreError> {
        self.store.zincr(REALTIME_SCORES_KEY, post_id, delta).await
    }

    /// Ids of the `limit` best-scored posts, best first.
    pub async fn top(&self, limit: usize) -> Result<Vec<Uuid>, CacheStoreError> {
        let members = self.store.zrange_desc(REALTIME_SCORES_KEY, limit).await?;
        Ok(members.into_iter().map(|(id, _)| id).collect())
    }

    /// One decay cycle: scale every score by `factor`, then prune entries
    /// at or below `floor`. Returns the number of pruned entries.
    pub async fn decay_once(&self, factor: f64, floor: f64) -> Result<u64, CacheStoreError> {
        self.store.zscale(REALTIME_SCORES_KEY, factor).await?;
        let pruned = self.store.zrem_below(REALTIME_SCORES_KEY, floor).await?;
        if pruned > 0 {
            debug!(pruned, "pruned cold realtime entries");
            counter!(METRIC_DECAY_PRUNED).increment(pruned);
        }
        Ok(pruned)
    }

    /// Drop `post_id` from the ranking entirely (post deleted).
    pub async fn remove(&self, post_id: Uuid) -> Result<(), CacheStoreError> {
        self.store.zrem(REALTIME_SCORES_KEY, post_id).await
    }
}
