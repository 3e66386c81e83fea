//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;
use vetrina::application::repos::{DurableStore, FeaturedNotifier, NotifyError, RepoError};
use vetrina::cache::{CacheStore, CacheStoreError, MemoryCacheStore};
use vetrina::domain::posts::{Category, PostSummary};

pub fn summary(title: &str, category: Category) -> PostSummary {
    let mut summary = PostSummary {
        id: Uuid::new_v4(),
        title: title.to_string(),
        created_at: OffsetDateTime::now_utc(),
        author_id: Some(Uuid::new_v4()),
        author_name: format!("author of {title}"),
        view_count: 100,
        like_count: 10,
        comment_count: 3,
        weekly: false,
        legend: false,
        notice: false,
    };
    match category {
        Category::Weekly => summary.weekly = true,
        Category::Legend => summary.legend = true,
        Category::Notice => summary.notice = true,
        Category::Realtime | Category::FirstPage => {}
    }
    summary
}

/// Durable store backed by a seeded post list, counting every query.
pub struct SeededDurableStore {
    posts: Mutex<Vec<PostSummary>>,
    pub category_queries: AtomicUsize,
    pub ids_queries: AtomicUsize,
    pub engagement_queries: AtomicUsize,
    /// Limits of every `list_by_category` call, in order.
    pub category_query_limits: Mutex<Vec<usize>>,
    latency: Duration,
}

impl SeededDurableStore {
    pub fn new(posts: Vec<PostSummary>) -> Self {
        Self {
            posts: Mutex::new(posts),
            category_queries: AtomicUsize::new(0),
            ids_queries: AtomicUsize::new(0),
            engagement_queries: AtomicUsize::new(0),
            category_query_limits: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn add_post(&self, post: PostSummary) {
        self.posts.lock().unwrap().push(post);
    }

    pub fn remove_post(&self, id: Uuid) {
        self.posts.lock().unwrap().retain(|post| post.id != id);
    }

    fn members_of(&self, category: Category) -> Vec<PostSummary> {
        let posts = self.posts.lock().unwrap();
        match category {
            Category::Weekly => posts.iter().filter(|p| p.weekly).cloned().collect(),
            Category::Legend => posts.iter().filter(|p| p.legend).cloned().collect(),
            Category::Notice => posts.iter().filter(|p| p.notice).cloned().collect(),
            Category::Realtime | Category::FirstPage => posts.clone(),
        }
    }
}

#[async_trait]
impl DurableStore for SeededDurableStore {
    async fn list_by_category(
        &self,
        category: Category,
        limit: usize,
    ) -> Result<(Vec<PostSummary>, usize), RepoError> {
        self.category_queries.fetch_add(1, Ordering::SeqCst);
        self.category_query_limits.lock().unwrap().push(limit);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let members = self.members_of(category);
        let total = members.len();
        Ok((members.into_iter().take(limit).collect(), total))
    }

    async fn list_by_ids_ordered(&self, ids: &[Uuid]) -> Result<Vec<PostSummary>, RepoError> {
        self.ids_queries.fetch_add(1, Ordering::SeqCst);
        let posts = self.posts.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| posts.iter().find(|post| post.id == *id).cloned())
            .collect())
    }

    async fn list_recent_by_engagement(
        &self,
        limit: usize,
    ) -> Result<Vec<PostSummary>, RepoError> {
        self.engagement_queries.fetch_add(1, Ordering::SeqCst);
        let posts = self.posts.lock().unwrap();
        let mut ranked: Vec<PostSummary> = posts.clone();
        ranked.sort_by(|a, b| b.like_count.cmp(&a.like_count));
        Ok(ranked.into_iter().take(limit).collect())
    }
}

/// Cache store with a failure toggle and a read-call counter.
pub struct FlakyCacheStore {
    inner: MemoryCacheStore,
    failing: AtomicBool,
    pub get_calls: AtomicUsize,
}

impl FlakyCacheStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryCacheStore::new(),
            failing: AtomicBool::new(false),
            get_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), CacheStoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(CacheStoreError::unavailable("injected failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheStore for FlakyCacheStore {
    async fn get_blob(&self, key: &str) -> Result<Option<Vec<u8>>, CacheStoreError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.get_blob(key).await
    }

    async fn set_blob(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), CacheStoreError> {
        self.check()?;
        self.inner.set_blob(key, value, ttl).await
    }

    async fn delete_blob(&self, key: &str) -> Result<(), CacheStoreError> {
        self.check()?;
        self.inner.delete_blob(key).await
    }

    async fn try_acquire_lease(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<bool, CacheStoreError> {
        self.check()?;
        self.inner.try_acquire_lease(key, ttl).await
    }

    async fn release_lease(&self, key: &str) -> Result<(), CacheStoreError> {
        self.check()?;
        self.inner.release_lease(key).await
    }

    async fn zincr(&self, key: &str, member: Uuid, delta: f64) -> Result<f64, CacheStoreError> {
        self.check()?;
        self.inner.zincr(key, member, delta).await
    }

    async fn zrange_desc(
        &self,
        key: &str,
        limit: usize,
    ) -> Result<Vec<(Uuid, f64)>, CacheStoreError> {
        self.check()?;
        self.inner.zrange_desc(key, limit).await
    }

    async fn zscale(&self, key: &str, factor: f64) -> Result<(), CacheStoreError> {
        self.check()?;
        self.inner.zscale(key, factor).await
    }

    async fn zrem_below(&self, key: &str, floor: f64) -> Result<u64, CacheStoreError> {
        self.check()?;
        self.inner.zrem_below(key, floor).await
    }

    async fn zrem(&self, key: &str, member: Uuid) -> Result<(), CacheStoreError> {
        self.check()?;
        self.inner.zrem(key, member).await
    }
}

/// Notifier that records every featured notification.
pub struct RecordingNotifier {
    pub featured: Mutex<Vec<(Uuid, Category)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            featured: Mutex::new(Vec::new()),
        }
    }

    pub fn count(&self) -> usize {
        self.featured.lock().unwrap().len()
    }
}

#[async_trait]
impl FeaturedNotifier for RecordingNotifier {
    async fn notify_featured(
        &self,
        author_id: Uuid,
        category: Category,
    ) -> Result<(), NotifyError> {
        self.featured.lock().unwrap().push((author_id, category));
        Ok(())
    }
}
