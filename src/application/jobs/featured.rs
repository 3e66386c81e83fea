//! Daily rebuild of the WEEKLY and LEGEND showcases.
//!
//! Unlike miss-triggered refreshes this rebuild is time-triggered, so it
//! replaces both blobs unconditionally instead of taking the refresh
//! lease. Authors appearing in a listing for the first time since the
//! previous rebuild get a featured notification.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use apalis::prelude::{Data, Error as ApalisError};
use apalis_cron::Schedule;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::refresh::RebuildError;
use crate::application::repos::{DurableStore, FeaturedNotifier};
use crate::cache::keys;
use crate::cache::{CacheConfig, CacheStore, decode_listing, encode_listing};
use crate::config::{FeaturedSettings, SettingsError};
use crate::domain::posts::Category;

const FEATURED_CATEGORIES: [Category; 2] = [Category::Weekly, Category::Legend];

/// Marker struct for the cron-triggered featured rebuild.
/// Must implement `From<chrono::DateTime<chrono::Utc>>` for apalis-cron compatibility.
#[derive(Default, Debug, Clone)]
pub struct FeaturedRebuildJob;

impl From<chrono::DateTime<chrono::Utc>> for FeaturedRebuildJob {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

/// Context for the featured rebuild worker.
#[derive(Clone)]
pub struct FeaturedJobContext {
    pub store: Arc<dyn CacheStore>,
    pub durable: Arc<dyn DurableStore>,
    pub notifier: Arc<dyn FeaturedNotifier>,
    pub config: CacheConfig,
    running: Arc<AtomicBool>,
}

impl FeaturedJobContext {
    pub fn new(
        store: Arc<dyn CacheStore>,
        durable: Arc<dyn DurableStore>,
        notifier: Arc<dyn FeaturedNotifier>,
        config: CacheConfig,
    ) -> Self {
        Self {
            store,
            durable,
            notifier,
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Process the daily rebuild for both featured categories. Failures are
/// logged per category and never abort the sibling rebuild.
pub async fn process_featured_rebuild_job(
    _job: FeaturedRebuildJob,
    ctx: Data<FeaturedJobContext>,
) -> Result<(), ApalisError> {
    if ctx.running.swap(true, Ordering::SeqCst) {
        debug!("featured rebuild still running; skipping tick");
        return Ok(());
    }

    for category in FEATURED_CATEGORIES {
        if let Err(err) = rebuild_featured_category(&ctx, category).await {
            warn!(category = %category, error = %err, "featured rebuild failed");
        }
    }

    ctx.running.store(false, Ordering::SeqCst);
    Ok(())
}

/// Recompute one featured category from the durable store, replace its
/// blob wholesale, and notify every newly-featured author.
pub async fn rebuild_featured_category(
    ctx: &FeaturedJobContext,
    category: Category,
) -> Result<(), RebuildError> {
    let key = keys::category_key(category);

    let previous_authors = match ctx.store.get_blob(&key).await {
        Ok(Some(bytes)) => authors_of(decode_listing(&bytes).unwrap_or_default()),
        Ok(None) => HashSet::new(),
        Err(err) => {
            // Without the previous listing every current author counts as
            // newly featured; prefer missing a diff over missing the blob.
            warn!(category = %category, error = %err, "previous listing unavailable");
            HashSet::new()
        }
    };

    let (items, _total) = ctx
        .durable
        .list_by_category(category, ctx.config.category_list_size)
        .await?;
    let blob = encode_listing(&items)?;
    ctx.store
        .set_blob(&key, &blob, ctx.config.ttl_for(category))
        .await?;

    let mut notified: HashSet<Uuid> = HashSet::new();
    for item in &items {
        let Some(author_id) = item.author_id else {
            continue;
        };
        if previous_authors.contains(&author_id) || !notified.insert(author_id) {
            continue;
        }
        if let Err(err) = ctx.notifier.notify_featured(author_id, category).await {
            warn!(author_id = %author_id, error = %err, "featured notification failed");
        }
    }

    info!(
        category = %category,
        count = items.len(),
        newly_featured = notified.len(),
        "featured listing rebuilt"
    );
    Ok(())
}

fn authors_of(items: Vec<crate::domain::posts::PostSummary>) -> HashSet<Uuid> {
    items.into_iter().filter_map(|item| item.author_id).collect()
}

/// Parse the featured rebuild schedule from settings.
pub fn featured_schedule(settings: &FeaturedSettings) -> Result<Schedule, SettingsError> {
    Schedule::from_str(&settings.cron).map_err(|err| SettingsError::InvalidCron {
        expression: settings.cron.clone(),
        message: err.to_string(),
    })
}
