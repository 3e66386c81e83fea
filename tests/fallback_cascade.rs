//! Failure-tier cascade: cache store, in-process snapshot, durable store.

mod support;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use support::{FlakyCacheStore, SeededDurableStore, summary};
use vetrina::cache::{CacheStore, encode_listing, keys};
use vetrina::config::{BreakerSettings, Settings};
use vetrina::{Category, PopularityCache};

fn breaker_settings() -> Settings {
    Settings {
        breaker: BreakerSettings {
            window: 4,
            failure_rate: 0.5,
            min_calls: 2,
            cool_down_ms: 100,
            half_open_trials: 1,
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn failing_store_degrades_to_the_durable_store() {
    let durable = Arc::new(SeededDurableStore::new(vec![
        summary("a", Category::Weekly),
        summary("b", Category::Weekly),
    ]));
    let store = Arc::new(FlakyCacheStore::new());
    store.set_failing(true);
    let cache = PopularityCache::new(store, durable.clone(), Settings::default());

    let page = cache
        .get_category_page(Category::Weekly, 0, 10)
        .await
        .expect("cache failure never reaches the caller");

    assert_eq!(page.items.len(), 2);
    assert_eq!(page.total, 2);
    assert!(durable.category_queries.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn undecodable_blob_is_served_as_a_miss() {
    let durable = Arc::new(SeededDurableStore::new(vec![summary("a", Category::Weekly)]));
    let store = Arc::new(FlakyCacheStore::new());
    store
        .set_blob(&keys::category_key(Category::Weekly), b"{corrupt", None)
        .await
        .unwrap();
    let cache = PopularityCache::new(store, durable.clone(), Settings::default());

    let page = cache
        .get_category_page(Category::Weekly, 0, 10)
        .await
        .expect("decode failure is a miss, not an error");

    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].title, "a");
}

#[tokio::test]
async fn open_breaker_short_circuits_the_cache_store() {
    let durable = Arc::new(SeededDurableStore::new(vec![
        summary("x", Category::Realtime),
        summary("y", Category::Realtime),
    ]));
    let store = Arc::new(FlakyCacheStore::new());
    let cache = PopularityCache::new(store.clone(), durable.clone(), breaker_settings());

    store.set_failing(true);

    // Two failing calls cross the 50% threshold at min_calls = 2.
    for _ in 0..2 {
        let page = cache
            .get_category_page(Category::Realtime, 0, 10)
            .await
            .expect("cascade serves the read");
        assert!(!page.items.is_empty());
    }
    assert_eq!(store.get_calls.load(Ordering::SeqCst), 2);

    // Open: reads keep succeeding without touching the store.
    for _ in 0..3 {
        cache
            .get_category_page(Category::Realtime, 0, 10)
            .await
            .expect("open breaker still serves");
    }
    assert_eq!(store.get_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn half_open_trial_closes_the_breaker_after_recovery() {
    let durable = Arc::new(SeededDurableStore::new(vec![summary(
        "fallback",
        Category::Realtime,
    )]));
    let store = Arc::new(FlakyCacheStore::new());
    let cache = PopularityCache::new(store.clone(), durable.clone(), breaker_settings());

    store.set_failing(true);
    for _ in 0..2 {
        cache
            .get_category_page(Category::Realtime, 0, 10)
            .await
            .unwrap();
    }
    assert_eq!(store.get_calls.load(Ordering::SeqCst), 2);

    // Recover the store and seed a realtime listing while the breaker
    // cools down.
    store.set_failing(false);
    let listing = vec![summary("hot", Category::Realtime)];
    store
        .set_blob(
            &keys::category_key(Category::Realtime),
            &encode_listing(&listing).unwrap(),
            None,
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    // One trial call probes the store, succeeds, and closes the breaker.
    let page = cache
        .get_category_page(Category::Realtime, 0, 10)
        .await
        .unwrap();
    assert_eq!(store.get_calls.load(Ordering::SeqCst), 3);
    assert_eq!(page.items[0].title, "hot");

    let page = cache
        .get_category_page(Category::Realtime, 0, 10)
        .await
        .unwrap();
    assert_eq!(store.get_calls.load(Ordering::SeqCst), 4);
    assert_eq!(page.items[0].title, "hot");
}

#[tokio::test]
async fn snapshot_tier_serves_before_the_durable_tier() {
    let hot = summary("hot", Category::Realtime);
    let warm = summary("warm", Category::Realtime);
    let durable = Arc::new(SeededDurableStore::new(vec![hot.clone(), warm.clone()]));
    let store = Arc::new(FlakyCacheStore::new());
    let cache = PopularityCache::new(store.clone(), durable.clone(), breaker_settings());

    // Build up realtime state while the store is healthy: scores feed the
    // ranking, the rebuild materializes the listing and the snapshot.
    cache.on_post_engaged(hot.id, 9.0).await;
    cache.on_post_engaged(warm.id, 4.0).await;
    cache.trigger_refresh(Category::Realtime);
    tokio::time::sleep(Duration::from_millis(100)).await;

    store.set_failing(true);
    let engagement_before = durable.engagement_queries.load(Ordering::SeqCst);

    let page = cache
        .get_category_page(Category::Realtime, 0, 10)
        .await
        .expect("snapshot tier serves the read");

    // Hydrated from snapshot ids in score order, no last-resort query.
    assert_eq!(page.items[0].id, hot.id);
    assert_eq!(page.items[1].id, warm.id);
    assert!(durable.ids_queries.load(Ordering::SeqCst) >= 1);
    assert_eq!(
        durable.engagement_queries.load(Ordering::SeqCst),
        engagement_before
    );
}

#[tokio::test]
async fn empty_snapshot_falls_through_to_the_engagement_listing() {
    let durable = Arc::new(SeededDurableStore::new(vec![
        summary("liked", Category::Realtime),
        summary("ignored", Category::Realtime),
    ]));
    let store = Arc::new(FlakyCacheStore::new());
    store.set_failing(true);
    let cache = PopularityCache::new(store, durable.clone(), breaker_settings());

    let page = cache
        .get_category_page(Category::Realtime, 0, 10)
        .await
        .expect("last-resort tier serves the read");

    assert!(!page.items.is_empty());
    assert_eq!(durable.engagement_queries.load(Ordering::SeqCst), 1);
    assert_eq!(durable.ids_queries.load(Ordering::SeqCst), 0);
}
