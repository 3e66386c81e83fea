//! Cache policy configuration.
//!
//! TTLs and size bounds per category, derived from `vetrina.toml`.
//! WEEKLY and LEGEND carry deliberately unequal TTLs so the two blobs
//! never expire in the same instant.

use std::time::Duration;

use serde::Deserialize;

use crate::domain::posts::Category;

// Default values for cache policy configuration
const DEFAULT_WEEKLY_TTL_SECS: u64 = 88_200; // 24.5h
const DEFAULT_LEGEND_TTL_SECS: u64 = 91_800; // 25.5h
const DEFAULT_FIRST_PAGE_TTL_SECS: u64 = 3_600;
const DEFAULT_CATEGORY_LIST_SIZE: usize = 100;
const DEFAULT_FALLBACK_PAGE_SIZE: usize = 50;
const DEFAULT_FIRST_PAGE_SIZE: usize = 20;
const DEFAULT_REALTIME_LIST_SIZE: usize = 50;
const DEFAULT_REALTIME_FALLBACK_SIZE: usize = 30;

/// Cache policy: per-category TTLs (`0` = permanent) and listing bounds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL of the WEEKLY blob in seconds.
    pub weekly_ttl_secs: u64,
    /// TTL of the LEGEND blob in seconds.
    pub legend_ttl_secs: u64,
    /// TTL of the NOTICE blob in seconds (0 = permanent).
    pub notice_ttl_secs: u64,
    /// TTL of the REALTIME backing blob in seconds (0 = permanent).
    pub realtime_ttl_secs: u64,
    /// TTL of the FIRST_PAGE blob in seconds.
    pub first_page_ttl_secs: u64,
    /// Membership bound for full category rebuilds.
    pub category_list_size: usize,
    /// Bound on the synchronous durable-store query used on a miss.
    pub fallback_page_size: usize,
    /// Size bound of the FIRST_PAGE listing.
    pub first_page_size: usize,
    /// Top-N of the score set projected into the REALTIME listing.
    pub realtime_list_size: usize,
    /// Bound on the last-resort recency/engagement fallback query.
    pub realtime_fallback_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            weekly_ttl_secs: DEFAULT_WEEKLY_TTL_SECS,
            legend_ttl_secs: DEFAULT_LEGEND_TTL_SECS,
            notice_ttl_secs: 0,
            realtime_ttl_secs: 0,
            first_page_ttl_secs: DEFAULT_FIRST_PAGE_TTL_SECS,
            category_list_size: DEFAULT_CATEGORY_LIST_SIZE,
            fallback_page_size: DEFAULT_FALLBACK_PAGE_SIZE,
            first_page_size: DEFAULT_FIRST_PAGE_SIZE,
            realtime_list_size: DEFAULT_REALTIME_LIST_SIZE,
            realtime_fallback_size: DEFAULT_REALTIME_FALLBACK_SIZE,
        }
    }
}

impl CacheConfig {
    /// TTL policy for `category`; `None` means the blob never expires.
    pub fn ttl_for(&self, category: Category) -> Option<Duration> {
        let secs = match category {
            Category::Weekly => self.weekly_ttl_secs,
            Category::Legend => self.legend_ttl_secs,
            Category::Notice => self.notice_ttl_secs,
            Category::Realtime => self.realtime_ttl_secs,
            Category::FirstPage => self.first_page_ttl_secs,
        };
        (secs > 0).then(|| Duration::from_secs(secs))
    }
}
