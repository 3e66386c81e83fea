//! Write-path invalidation.
//!
//! Targeted single-entry blob patches triggered by post writes. Patches
//! are optimistic read-modify-write without a lock: a patch racing a full
//! rebuild may be overwritten by either outcome, and both represent a
//! valid recent state that the next rebuild reconciles. Every operation is
//! best-effort; a failed patch is logged and healed by the next rebuild.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::refresh::RefreshHandle;
use crate::cache::keys;
use crate::cache::{CacheConfig, CacheStore, RealtimeScores, decode_listing, encode_listing};
use crate::domain::posts::{Category, PostSummary};

pub struct WritePathInvalidator {
    store: Arc<dyn CacheStore>,
    scores: Arc<RealtimeScores>,
    refresh: RefreshHandle,
    config: CacheConfig,
}

impl WritePathInvalidator {
    pub fn new(
        store: Arc<dyn CacheStore>,
        scores: Arc<RealtimeScores>,
        refresh: RefreshHandle,
        config: CacheConfig,
    ) -> Self {
        Self {
            store,
            scores,
            refresh,
            config,
        }
    }

    /// A new post lands at the head of FIRST_PAGE and nowhere else: a
    /// create cannot retroactively belong to WEEKLY or LEGEND.
    pub async fn on_post_created(&self, summary: &PostSummary) {
        let patched = self
            .patch(Category::FirstPage, |listing| {
                listing.retain(|item| item.id != summary.id);
                listing.insert(0, summary.clone());
                listing.truncate(self.config.first_page_size.max(1));
                true
            })
            .await;
        if !patched {
            // No blob to patch yet; let a rebuild seed it.
            self.refresh.trigger(Category::FirstPage);
        }
    }

    /// Patch the edited entry in place in every category blob holding it,
    /// leaving order and all other entries untouched.
    pub async fn on_post_updated(&self, summary: &PostSummary) {
        for category in Category::ALL {
            self.patch(category, |listing| {
                let mut changed = false;
                for item in listing.iter_mut() {
                    if item.id == summary.id {
                        *item = summary.clone();
                        changed = true;
                    }
                }
                changed
            })
            .await;
        }
    }

    /// Remove the post from every category blob and from the realtime
    /// ranking.
    pub async fn on_post_deleted(&self, post_id: Uuid) {
        for category in Category::ALL {
            self.patch(category, |listing| {
                let before = listing.len();
                listing.retain(|item| item.id != post_id);
                listing.len() != before
            })
            .await;
        }
        if let Err(err) = self.scores.remove(post_id).await {
            warn!(post_id = %post_id, error = %err, "realtime score removal failed");
        }
    }

    /// Admin notice toggle: membership changes are rare and precisely
    /// known at the call site, so the NOTICE blob is patched directly.
    pub async fn on_notice_toggled(&self, summary: &PostSummary, enabled: bool) {
        self.patch(Category::Notice, |listing| {
            let before = listing.len();
            listing.retain(|item| item.id != summary.id);
            let removed = listing.len() != before;
            if enabled {
                listing.insert(0, summary.clone());
                return true;
            }
            removed
        })
        .await;
    }

    /// A like or view event feeds the realtime score set.
    pub async fn on_post_engaged(&self, post_id: Uuid, weight: f64) {
        if let Err(err) = self.scores.increment(post_id, weight).await {
            warn!(post_id = %post_id, error = %err, "realtime score increment failed");
        }
    }

    /// Drop a whole category blob and schedule its rebuild. For writes
    /// whose cache effect is not a single known entry, such as a category
    /// reassignment.
    pub async fn invalidate_category(&self, category: Category) {
        let key = keys::category_key(category);
        if let Err(err) = self.store.delete_blob(&key).await {
            warn!(category = %category, error = %err, "category invalidation failed");
        }
        self.refresh.trigger(category);
    }

    /// Optimistic single-entry patch: read the blob, mutate, write back
    /// wholesale. Returns whether a blob was rewritten.
    async fn patch<F>(&self, category: Category, mutate: F) -> bool
    where
        F: FnOnce(&mut Vec<PostSummary>) -> bool,
    {
        let key = keys::category_key(category);
        let bytes = match self.store.get_blob(&key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return false,
            Err(err) => {
                warn!(category = %category, error = %err, "cache read for patch failed");
                return false;
            }
        };
        let Some(mut listing) = decode_listing(&bytes) else {
            return false;
        };
        if !mutate(&mut listing) {
            return false;
        }

        let blob = match encode_listing(&listing) {
            Ok(blob) => blob,
            Err(err) => {
                warn!(category = %category, error = %err, "listing encode for patch failed");
                return false;
            }
        };
        match self
            .store
            .set_blob(&key, &blob, self.config.ttl_for(category))
            .await
        {
            Ok(()) => {
                debug!(category = %category, count = listing.len(), "category blob patched");
                true
            }
            Err(err) => {
                warn!(
                    category = %category,
                    error = %err,
                    "category blob patch failed; next rebuild heals it"
                );
                false
            }
        }
    }
}
