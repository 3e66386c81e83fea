//! In-process fallback snapshots.
//!
//! A bounded, TTL'd copy of the most recent realtime ordering, consulted
//! only when the cache store is judged unhealthy. Strictly best-effort: a
//! missing or expired snapshot just drops the reader to the next tier.

use std::num::NonZeroUsize;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use lru::LruCache;
use uuid::Uuid;

use super::lock::{rw_read, rw_write};
use crate::domain::posts::Category;

const SOURCE: &str = "cache::snapshot";

struct StoredSnapshot {
    ids: Vec<Uuid>,
    stored_at: Instant,
}

/// Bounded snapshot cache keyed by category.
pub struct SnapshotCache {
    entries: RwLock<LruCache<Category, StoredSnapshot>>,
    ttl: Duration,
    max_ids: usize,
}

impl SnapshotCache {
    pub fn new(capacity: NonZeroUsize, ttl: Duration, max_ids: usize) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            ttl,
            max_ids: max_ids.max(1),
        }
    }

    /// Replace the snapshot for `category`, truncated to the id bound.
    pub fn store(&self, category: Category, mut ids: Vec<Uuid>) {
        ids.truncate(self.max_ids);
        rw_write(&self.entries, SOURCE, "store").put(
            category,
            StoredSnapshot {
                ids,
                stored_at: Instant::now(),
            },
        );
    }

    /// Up to `limit` ids from a live snapshot, or `None` when absent,
    /// expired, or empty.
    pub fn top_ids(&self, category: Category, limit: usize) -> Option<Vec<Uuid>> {
        let mut entries = rw_write(&self.entries, SOURCE, "top_ids");
        let stale = match entries.get(&category) {
            None => return None,
            Some(snapshot) => {
                snapshot.stored_at.elapsed() >= self.ttl || snapshot.ids.is_empty()
            }
        };
        if stale {
            entries.pop(&category);
            return None;
        }
        entries
            .get(&category)
            .map(|snapshot| snapshot.ids.iter().take(limit).copied().collect())
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        rw_write(&self.entries, SOURCE, "clear").clear();
    }
}
