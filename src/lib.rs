//! Vetrina: the tiered popularity cache behind a content platform's
//! weekly / legend / notice / realtime / first-page listings.
//!
//! Listings are served cache-aside from one atomic blob per category in a
//! shared key-value store. A miss answers the current request from the
//! durable store and signals a single-flight rebuild (one lease per
//! category, bounded worker pool). Realtime reads are guarded by a circuit
//! breaker that degrades through an in-process snapshot down to the
//! durable store, and realtime scores decay on a cron schedule. Worst case
//! under a total cache-store outage every read falls through to the
//! durable store: slower, never wrong, and never an error the caller can
//! attribute to the cache.
//!
//! ## Wiring
//!
//! ```ignore
//! let settings = Settings::load(None)?;
//! let store = Arc::new(RedisCacheStore::connect(&settings.redis).await?);
//! let cache = PopularityCache::new(store, durable, settings);
//! let jobs = cache.spawn_jobs(notifier)?;
//!
//! let page = cache.get_category_page(Category::Weekly, 0, 10).await?;
//! ```

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;

pub use application::error::ListingError;
pub use application::reader::{CategoryPage, CategoryReadService};
pub use application::repos::{DurableStore, FeaturedNotifier, NotifyError, RepoError};
pub use application::service::PopularityCache;
pub use cache::{CacheStore, CacheStoreError, MemoryCacheStore};
pub use crate::config::Settings;
pub use domain::posts::{Category, PostSummary};
pub use infra::redis::RedisCacheStore;
