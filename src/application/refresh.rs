//! Single-flight category refresh.
//!
//! `RefreshHandle::trigger` is fire-and-forget: it enqueues the category
//! onto a bounded worker pool and returns immediately. Workers take a
//! short-lived lease in the cache store before rebuilding, so N concurrent
//! misses cost exactly one durable-store rebuild; losing the lease race is
//! the success path ("someone else is handling it"). The pool's
//! concurrency is independent of request handling, so rebuilds cannot
//! starve user-facing reads.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashSet;
use metrics::{counter, histogram};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::application::repos::{DurableStore, RepoError};
use crate::cache::keys;
use crate::cache::{
    CacheConfig, CacheStore, CacheStoreError, RealtimeScores, RetryPolicy, SnapshotCache,
    call_with_retry, encode_listing,
};
use crate::domain::posts::Category;

const METRIC_REFRESH_MS: &str = "vetrina_refresh_ms";
const METRIC_DROPPED: &str = "vetrina_refresh_dropped_total";

/// Rebuild timing knobs.
#[derive(Debug, Clone)]
pub struct RefreshOptions {
    /// Bound on the lease acquisition round trip.
    pub lease_wait: Duration,
    /// Lease lifetime; must exceed the expected rebuild duration so a
    /// crashed holder cannot block rebuilds past its natural expiry.
    pub lease_ttl: Duration,
    /// Retry budget for the blob write.
    pub retry: RetryPolicy,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            lease_wait: Duration::from_secs(2),
            lease_ttl: Duration::from_secs(15),
            retry: RetryPolicy::default(),
        }
    }
}

/// Failure inside one rebuild attempt. Never propagated past the worker:
/// the next miss retriggers.
#[derive(Debug, Error)]
pub enum RebuildError {
    #[error(transparent)]
    Durable(#[from] RepoError),
    #[error(transparent)]
    Store(#[from] CacheStoreError),
    #[error("listing encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Cheap, clonable trigger surface handed to readers and invalidators.
#[derive(Clone)]
pub struct RefreshHandle {
    tx: mpsc::Sender<Category>,
    pending: Arc<DashSet<Category>>,
}

impl RefreshHandle {
    /// Request an asynchronous rebuild of `category`. Never blocks; a
    /// trigger for a category that is already queued or rebuilding is a
    /// no-op, and a full queue drops the trigger.
    pub fn trigger(&self, category: Category) {
        if !self.pending.insert(category) {
            debug!(category = %category, "refresh already pending; skipping trigger");
            return;
        }
        match self.tx.try_send(category) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.pending.remove(&category);
                counter!(METRIC_DROPPED).increment(1);
                debug!(category = %category, "refresh queue full; dropping trigger");
            }
            Err(TrySendError::Closed(_)) => {
                self.pending.remove(&category);
                warn!(category = %category, "refresh pool stopped; dropping trigger");
            }
        }
    }
}

/// Rebuilds one category listing under the cross-process lease.
pub struct RefreshCoordinator {
    store: Arc<dyn CacheStore>,
    durable: Arc<dyn DurableStore>,
    scores: Arc<RealtimeScores>,
    snapshot: Arc<SnapshotCache>,
    config: CacheConfig,
    options: RefreshOptions,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<dyn CacheStore>,
        durable: Arc<dyn DurableStore>,
        scores: Arc<RealtimeScores>,
        snapshot: Arc<SnapshotCache>,
        config: CacheConfig,
        options: RefreshOptions,
    ) -> Self {
        Self {
            store,
            durable,
            scores,
            snapshot,
            config,
            options,
        }
    }

    /// Rebuild `category` if no other worker holds its lease. All failures
    /// are logged and swallowed.
    #[instrument(skip(self))]
    pub async fn rebuild(&self, category: Category) {
        let started = Instant::now();
        let lease = keys::lease_key(category);

        let acquired = match timeout(
            self.options.lease_wait,
            self.store.try_acquire_lease(&lease, self.options.lease_ttl),
        )
        .await
        {
            Ok(Ok(acquired)) => acquired,
            Ok(Err(err)) => {
                warn!(error = %err, "lease acquisition failed; skipping rebuild");
                return;
            }
            Err(_) => {
                warn!(
                    wait_ms = self.options.lease_wait.as_millis() as u64,
                    "lease acquisition timed out; skipping rebuild"
                );
                return;
            }
        };
        if !acquired {
            debug!("refresh already in flight elsewhere; skipping");
            return;
        }

        match self.rebuild_locked(category).await {
            Ok(count) => info!(count, "category listing rebuilt"),
            Err(err) => warn!(error = %err, "category rebuild failed; a later miss retriggers"),
        }

        if let Err(err) = self.store.release_lease(&lease).await {
            warn!(error = %err, "lease release failed; lease will expire naturally");
        }

        histogram!(METRIC_REFRESH_MS, "category" => category.as_str())
            .record(started.elapsed().as_secs_f64() * 1000.0);
    }

    async fn rebuild_locked(&self, category: Category) -> Result<usize, RebuildError> {
        let items = match category {
            Category::Realtime => {
                let ids = self.scores.top(self.config.realtime_list_size).await?;
                if ids.is_empty() {
                    Vec::new()
                } else {
                    self.durable.list_by_ids_ordered(&ids).await?
                }
            }
            _ => {
                self.durable
                    .list_by_category(category, self.config.category_list_size)
                    .await?
                    .0
            }
        };

        let blob = encode_listing(&items)?;
        let key = keys::category_key(category);
        let ttl = self.config.ttl_for(category);
        call_with_retry(&self.options.retry, "cache.set_blob", || {
            self.store.set_blob(&key, &blob, ttl)
        })
        .await?;

        if category == Category::Realtime {
            self.snapshot
                .store(Category::Realtime, items.iter().map(|item| item.id).collect());
        }
        Ok(items.len())
    }
}

/// Start `concurrency` rebuild workers fed by a queue of `queue_depth`
/// pending categories. Returns the trigger handle and the worker tasks.
pub fn spawn_pool(
    coordinator: Arc<RefreshCoordinator>,
    queue_depth: usize,
    concurrency: usize,
) -> (RefreshHandle, Vec<JoinHandle<()>>) {
    let (tx, rx) = mpsc::channel(queue_depth.max(1));
    let pending: Arc<DashSet<Category>> = Arc::new(DashSet::new());
    let rx = Arc::new(tokio::sync::Mutex::new(rx));

    let workers = (0..concurrency.max(1))
        .map(|_| {
            let rx = Arc::clone(&rx);
            let pending = Arc::clone(&pending);
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                loop {
                    let category = {
                        let mut rx = rx.lock().await;
                        match rx.recv().await {
                            Some(category) => category,
                            None => break,
                        }
                    };
                    coordinator.rebuild(category).await;
                    pending.remove(&category);
                }
            })
        })
        .collect();

    (RefreshHandle { tx, pending }, workers)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::*;
    use crate::cache::{MemoryCacheStore, decode_listing};
    use crate::domain::posts::PostSummary;

    fn summary(title: &str) -> PostSummary {
        PostSummary {
            id: Uuid::new_v4(),
            title: title.to_string(),
            created_at: OffsetDateTime::now_utc(),
            author_id: Some(Uuid::new_v4()),
            author_name: "ada".to_string(),
            view_count: 0,
            like_count: 0,
            comment_count: 0,
            weekly: true,
            legend: false,
            notice: false,
        }
    }

    /// Durable store that answers after a short delay so concurrent
    /// rebuilds genuinely overlap.
    struct SlowDurable {
        items: Vec<PostSummary>,
        category_queries: AtomicUsize,
    }

    impl SlowDurable {
        fn new(items: Vec<PostSummary>) -> Self {
            Self {
                items,
                category_queries: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DurableStore for SlowDurable {
        async fn list_by_category(
            &self,
            _category: Category,
            limit: usize,
        ) -> Result<(Vec<PostSummary>, usize), RepoError> {
            self.category_queries.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            let total = self.items.len();
            Ok((self.items.iter().take(limit).cloned().collect(), total))
        }

        async fn list_by_ids_ordered(
            &self,
            ids: &[Uuid],
        ) -> Result<Vec<PostSummary>, RepoError> {
            Ok(ids
                .iter()
                .filter_map(|id| self.items.iter().find(|item| item.id == *id).cloned())
                .collect())
        }

        async fn list_recent_by_engagement(
            &self,
            limit: usize,
        ) -> Result<Vec<PostSummary>, RepoError> {
            Ok(self.items.iter().take(limit).cloned().collect())
        }
    }

    fn coordinator(durable: Arc<SlowDurable>, store: Arc<MemoryCacheStore>) -> RefreshCoordinator {
        let scores = Arc::new(RealtimeScores::new(store.clone()));
        let snapshot = Arc::new(SnapshotCache::new(
            std::num::NonZeroUsize::new(4).unwrap(),
            Duration::from_secs(60),
            100,
        ));
        RefreshCoordinator::new(
            store,
            durable,
            scores,
            snapshot,
            CacheConfig::default(),
            RefreshOptions::default(),
        )
    }

    #[tokio::test]
    async fn concurrent_rebuilds_issue_one_durable_query() {
        let durable = Arc::new(SlowDurable::new(vec![summary("a"), summary("b")]));
        let store = Arc::new(MemoryCacheStore::new());
        let coordinator = Arc::new(coordinator(durable.clone(), store));

        let rebuilds = (0..8).map(|_| {
            let coordinator = Arc::clone(&coordinator);
            async move { coordinator.rebuild(Category::Weekly).await }
        });
        futures::future::join_all(rebuilds).await;

        assert_eq!(durable.category_queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rebuild_writes_the_listing_blob() {
        let items = vec![summary("a"), summary("b"), summary("c")];
        let durable = Arc::new(SlowDurable::new(items.clone()));
        let store = Arc::new(MemoryCacheStore::new());
        let coordinator = coordinator(durable, store.clone());

        coordinator.rebuild(Category::Weekly).await;

        let blob = store
            .get_blob(&keys::category_key(Category::Weekly))
            .await
            .unwrap()
            .expect("blob written");
        assert_eq!(decode_listing(&blob).unwrap(), items);
    }

    #[tokio::test]
    async fn rebuild_releases_the_lease() {
        let durable = Arc::new(SlowDurable::new(vec![summary("a")]));
        let store = Arc::new(MemoryCacheStore::new());
        let coordinator = coordinator(durable, store.clone());

        coordinator.rebuild(Category::Weekly).await;

        // A fresh acquisition must succeed immediately after completion.
        assert!(
            store
                .try_acquire_lease(&keys::lease_key(Category::Weekly), Duration::from_secs(1))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn handle_coalesces_pending_triggers() {
        let durable = Arc::new(SlowDurable::new(vec![summary("a")]));
        let store = Arc::new(MemoryCacheStore::new());
        let coordinator = Arc::new(coordinator(durable.clone(), store));
        let (handle, _workers) = spawn_pool(coordinator, 16, 2);

        for _ in 0..10 {
            handle.trigger(Category::Weekly);
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(durable.category_queries.load(Ordering::SeqCst), 1);
    }
}
