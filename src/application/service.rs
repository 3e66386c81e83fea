//! Facade wiring the popularity cache together.

use std::sync::Arc;

use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::application::error::ListingError;
use crate::application::invalidate::WritePathInvalidator;
use crate::application::jobs::{self, DecayJobContext, FeaturedJobContext};
use crate::application::reader::{CategoryPage, CategoryReadService};
use crate::application::refresh::{RefreshCoordinator, RefreshHandle, RefreshOptions, spawn_pool};
use crate::application::repos::{DurableStore, FeaturedNotifier};
use crate::cache::{
    BreakerConfig, CacheConfig, CacheStore, CircuitBreaker, RealtimeScores, SnapshotCache,
};
use crate::config::{Settings, SettingsError};
use crate::domain::posts::{Category, PostSummary};

/// The popularity cache, fully wired.
///
/// Construction spawns the refresh worker pool, so a Tokio runtime must be
/// current. The decay and featured-rebuild cron workers are opt-in via
/// [`PopularityCache::spawn_jobs`].
pub struct PopularityCache {
    reader: CategoryReadService,
    invalidator: WritePathInvalidator,
    refresh: RefreshHandle,
    scores: Arc<RealtimeScores>,
    store: Arc<dyn CacheStore>,
    durable: Arc<dyn DurableStore>,
    config: CacheConfig,
    settings: Settings,
    workers: Vec<JoinHandle<()>>,
}

impl PopularityCache {
    pub fn new(
        store: Arc<dyn CacheStore>,
        durable: Arc<dyn DurableStore>,
        settings: Settings,
    ) -> Self {
        let config = settings.cache.clone();
        let scores = Arc::new(RealtimeScores::new(store.clone()));
        let snapshot = Arc::new(SnapshotCache::new(
            settings.snapshot.capacity_non_zero(),
            settings.snapshot.ttl(),
            settings.snapshot.max_ids,
        ));
        let breaker = Arc::new(CircuitBreaker::new(BreakerConfig::from(&settings.breaker)));

        let coordinator = Arc::new(RefreshCoordinator::new(
            store.clone(),
            durable.clone(),
            scores.clone(),
            snapshot.clone(),
            config.clone(),
            RefreshOptions::from(&settings.refresh),
        ));
        let (refresh, workers) = spawn_pool(
            coordinator,
            settings.refresh.queue_depth,
            settings.refresh.worker_concurrency,
        );

        let reader = CategoryReadService::new(
            store.clone(),
            durable.clone(),
            refresh.clone(),
            breaker,
            snapshot,
            config.clone(),
        );
        let invalidator =
            WritePathInvalidator::new(store.clone(), scores.clone(), refresh.clone(), config.clone());

        Self {
            reader,
            invalidator,
            refresh,
            scores,
            store,
            durable,
            config,
            settings,
            workers,
        }
    }

    /// See [`CategoryReadService::get_category_page`].
    pub async fn get_category_page(
        &self,
        category: Category,
        offset: usize,
        size: usize,
    ) -> Result<CategoryPage, ListingError> {
        self.reader.get_category_page(category, offset, size).await
    }

    /// Fire-and-forget rebuild request for `category`.
    pub fn trigger_refresh(&self, category: Category) {
        self.refresh.trigger(category);
    }

    pub async fn on_post_created(&self, summary: &PostSummary) {
        self.invalidator.on_post_created(summary).await;
    }

    pub async fn on_post_updated(&self, summary: &PostSummary) {
        self.invalidator.on_post_updated(summary).await;
    }

    pub async fn on_post_deleted(&self, post_id: Uuid) {
        self.invalidator.on_post_deleted(post_id).await;
    }

    pub async fn on_notice_toggled(&self, summary: &PostSummary, enabled: bool) {
        self.invalidator.on_notice_toggled(summary, enabled).await;
    }

    pub async fn on_post_engaged(&self, post_id: Uuid, weight: f64) {
        self.invalidator.on_post_engaged(post_id, weight).await;
    }

    pub async fn invalidate_category(&self, category: Category) {
        self.invalidator.invalidate_category(category).await;
    }

    /// Spawn the decay and featured-rebuild cron workers.
    pub fn spawn_jobs(
        &self,
        notifier: Arc<dyn FeaturedNotifier>,
    ) -> Result<JoinHandle<()>, SettingsError> {
        let decay_context = DecayJobContext::new(self.scores.clone(), &self.settings.decay);
        let decay_schedule = jobs::decay_schedule(&self.settings.decay)?;
        let featured_context = FeaturedJobContext::new(
            self.store.clone(),
            self.durable.clone(),
            notifier,
            self.config.clone(),
        );
        let featured_schedule = jobs::featured_schedule(&self.settings.featured)?;
        Ok(jobs::spawn_job_monitor(
            decay_context,
            decay_schedule,
            featured_context,
            featured_schedule,
        ))
    }

    /// Stop the refresh workers. Queued triggers are dropped.
    pub fn shutdown(&self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}
