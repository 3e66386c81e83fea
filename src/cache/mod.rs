//! Vetrina cache plumbing.
//!
//! Everything between the application services and the shared key-value
//! store:
//!
//! - **Store contract**: blobs, leases, and the realtime score set
//!   ([`CacheStore`]), with in-memory and Redis adapters.
//! - **Resilience**: the realtime circuit breaker, the in-process fallback
//!   snapshot, and the bounded retry policy used by rebuild writes.
//! - **Policy**: per-category TTLs and listing bounds ([`CacheConfig`]).
//!
//! ## Configuration
//!
//! Cache policy is controlled via `vetrina.toml`:
//!
//! ```toml
//! [cache]
//! weekly_ttl_secs = 88200
//! first_page_size = 20
//! # ... see config.rs for all options
//! ```

mod breaker;
mod codec;
mod config;
pub mod keys;
mod lock;
mod memory;
mod retry;
mod scores;
mod snapshot;
mod store;

pub use breaker::{BreakerConfig, BreakerError, BreakerState, CircuitBreaker};
pub use codec::{decode_listing, encode_listing};
pub use config::CacheConfig;
pub use memory::MemoryCacheStore;
pub use retry::{RetryPolicy, call_with_retry};
pub use scores::RealtimeScores;
pub use snapshot::SnapshotCache;
pub use store::{CacheStore, CacheStoreError};
