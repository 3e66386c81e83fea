//! Category listing read path.
//!
//! Cache-aside with a synchronous durable-store fallback: a hit is served
//! straight from the category blob with no further I/O; a miss (or any
//! cache-store failure) answers the current request from the durable store
//! and signals an asynchronous rebuild. REALTIME reads additionally pass
//! through the circuit breaker and its three-tier cascade.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, instrument, warn};

use crate::application::error::ListingError;
use crate::application::refresh::RefreshHandle;
use crate::application::repos::DurableStore;
use crate::cache::keys;
use crate::cache::{
    BreakerError, CacheConfig, CacheStore, CircuitBreaker, SnapshotCache, decode_listing,
};
use crate::domain::posts::{Category, PostSummary};

const METRIC_HIT: &str = "vetrina_cache_hit_total";
const METRIC_MISS: &str = "vetrina_cache_miss_total";
const METRIC_FALLBACK: &str = "vetrina_fallback_total";

/// One page of a category listing plus the listing's total size.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryPage {
    pub items: Vec<PostSummary>,
    pub total: usize,
}

/// Outcome of a breaker-guarded realtime blob read.
enum RealtimeRead {
    /// The store answered; `None` is an ordinary miss.
    Answered(Option<Vec<PostSummary>>),
    /// The store is unhealthy; run the fallback cascade.
    Degraded,
}

pub struct CategoryReadService {
    store: Arc<dyn CacheStore>,
    durable: Arc<dyn DurableStore>,
    refresh: RefreshHandle,
    breaker: Arc<CircuitBreaker>,
    snapshot: Arc<SnapshotCache>,
    config: CacheConfig,
}

impl CategoryReadService {
    pub fn new(
        store: Arc<dyn CacheStore>,
        durable: Arc<dyn DurableStore>,
        refresh: RefreshHandle,
        breaker: Arc<CircuitBreaker>,
        snapshot: Arc<SnapshotCache>,
        config: CacheConfig,
    ) -> Self {
        Self {
            store,
            durable,
            refresh,
            breaker,
            snapshot,
            config,
        }
    }

    /// Serve one page of `category`.
    ///
    /// Pagination is stable within the lifetime of one cached blob; a
    /// rebuild completing between two reads may shift results, which
    /// callers must tolerate.
    #[instrument(skip(self))]
    pub async fn get_category_page(
        &self,
        category: Category,
        offset: usize,
        size: usize,
    ) -> Result<CategoryPage, ListingError> {
        let cached = if category == Category::Realtime {
            match self.read_realtime_blob().await {
                RealtimeRead::Answered(listing) => listing,
                RealtimeRead::Degraded => return self.realtime_cascade(offset, size).await,
            }
        } else {
            self.read_blob(category).await
        };

        if let Some(listing) = cached {
            counter!(METRIC_HIT, "category" => category.as_str()).increment(1);
            let total = listing.len();
            return Ok(page_of(&listing, offset, size, total));
        }

        counter!(METRIC_MISS, "category" => category.as_str()).increment(1);
        self.refresh.trigger(category);

        if category == Category::Realtime {
            // There is no direct durable query for realtime membership;
            // the engagement-ranked listing stands in for this request.
            let items = self
                .durable
                .list_recent_by_engagement(self.config.realtime_fallback_size)
                .await?;
            counter!(METRIC_FALLBACK, "tier" => "durable").increment(1);
            let total = items.len();
            return Ok(page_of(&items, offset, size, total));
        }

        let (items, total) = self
            .durable
            .list_by_category(category, self.config.fallback_page_size)
            .await?;
        counter!(METRIC_FALLBACK, "tier" => "durable").increment(1);
        Ok(page_of(&items, offset, size, total))
    }

    async fn read_blob(&self, category: Category) -> Option<Vec<PostSummary>> {
        let key = keys::category_key(category);
        match self.store.get_blob(&key).await {
            Ok(Some(bytes)) => decode_listing(&bytes).filter(|listing| !listing.is_empty()),
            Ok(None) => None,
            Err(err) => {
                warn!(
                    category = %category,
                    error = %err,
                    "cache store read failed; serving from durable store"
                );
                None
            }
        }
    }

    async fn read_realtime_blob(&self) -> RealtimeRead {
        let key = keys::category_key(Category::Realtime);
        match self.breaker.call(|| self.store.get_blob(&key)).await {
            Ok(Some(bytes)) => {
                RealtimeRead::Answered(decode_listing(&bytes).filter(|l| !l.is_empty()))
            }
            Ok(None) => RealtimeRead::Answered(None),
            Err(BreakerError::Open) => {
                debug!("realtime breaker open; running fallback cascade");
                RealtimeRead::Degraded
            }
            Err(BreakerError::Inner(err)) => {
                warn!(error = %err, "realtime cache read failed; running fallback cascade");
                RealtimeRead::Degraded
            }
        }
    }

    /// Tiers two and three: in-process snapshot ids hydrated by the durable
    /// store, then the engagement-ranked durable listing.
    async fn realtime_cascade(
        &self,
        offset: usize,
        size: usize,
    ) -> Result<CategoryPage, ListingError> {
        if let Some(ids) = self
            .snapshot
            .top_ids(Category::Realtime, self.config.realtime_list_size)
        {
            match self.durable.list_by_ids_ordered(&ids).await {
                Ok(items) if !items.is_empty() => {
                    counter!(METRIC_FALLBACK, "tier" => "snapshot").increment(1);
                    let total = items.len();
                    return Ok(page_of(&items, offset, size, total));
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "snapshot hydration failed; dropping to durable fallback");
                }
            }
        }

        let items = self
            .durable
            .list_recent_by_engagement(self.config.realtime_fallback_size)
            .await?;
        counter!(METRIC_FALLBACK, "tier" => "durable").increment(1);
        let total = items.len();
        Ok(page_of(&items, offset, size, total))
    }
}

/// Slice one page out of an in-memory listing. Out-of-range offsets yield
/// an empty page, never an error.
fn page_of(items: &[PostSummary], offset: usize, size: usize, total: usize) -> CategoryPage {
    let page = if size == 0 || offset >= items.len() {
        Vec::new()
    } else {
        let end = offset.saturating_add(size).min(items.len());
        items[offset..end].to_vec()
    };
    CategoryPage { items: page, total }
}
