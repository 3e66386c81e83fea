//! Configuration layer: typed settings with layered precedence (file → env).

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::refresh::RefreshOptions;
use crate::cache::{BreakerConfig, CacheConfig, RetryPolicy};

const LOCAL_CONFIG_BASENAME: &str = "vetrina";
const ENV_PREFIX: &str = "VETRINA";

const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
const DEFAULT_REDIS_OP_TIMEOUT_MS: u64 = 250;
const DEFAULT_LEASE_WAIT_MS: u64 = 2_000;
const DEFAULT_LEASE_TTL_MS: u64 = 15_000;
const DEFAULT_QUEUE_DEPTH: usize = 64;
const DEFAULT_WORKER_CONCURRENCY: usize = 2;
const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 100;
const DEFAULT_RETRY_MULTIPLIER: f64 = 2.0;
const DEFAULT_DECAY_CRON: &str = "0 */10 * * * *";
const DEFAULT_DECAY_FACTOR: f64 = 0.97;
const DEFAULT_DECAY_FLOOR: f64 = 1.0;
const DEFAULT_FEATURED_CRON: &str = "0 0 4 * * *";
const DEFAULT_BREAKER_WINDOW: usize = 20;
const DEFAULT_BREAKER_FAILURE_RATE: f64 = 0.5;
const DEFAULT_BREAKER_MIN_CALLS: usize = 10;
const DEFAULT_BREAKER_COOL_DOWN_MS: u64 = 5_000;
const DEFAULT_BREAKER_HALF_OPEN_TRIALS: usize = 3;
const DEFAULT_SNAPSHOT_CAPACITY: usize = 8;
const DEFAULT_SNAPSHOT_TTL_SECS: u64 = 300;
const DEFAULT_SNAPSHOT_MAX_IDS: usize = 100;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("configuration could not be loaded: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid cron expression `{expression}`: {message}")]
    InvalidCron { expression: String, message: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}

/// Base log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisSettings {
    /// Connection URL of the shared cache store.
    pub url: String,
    /// Bound applied to every cache-store round trip.
    pub op_timeout_ms: u64,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_REDIS_URL.to_string(),
            op_timeout_ms: DEFAULT_REDIS_OP_TIMEOUT_MS,
        }
    }
}

impl RedisSettings {
    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    /// Bound on the lease acquisition round trip.
    pub lease_wait_ms: u64,
    /// Lease lifetime; longer than the expected rebuild duration.
    pub lease_ttl_ms: u64,
    /// Pending triggers the refresh queue can hold.
    pub queue_depth: usize,
    /// Rebuild workers, independent of request handling.
    pub worker_concurrency: usize,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_multiplier: f64,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            lease_wait_ms: DEFAULT_LEASE_WAIT_MS,
            lease_ttl_ms: DEFAULT_LEASE_TTL_MS,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            worker_concurrency: DEFAULT_WORKER_CONCURRENCY,
            retry_max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            retry_multiplier: DEFAULT_RETRY_MULTIPLIER,
        }
    }
}

impl From<&RefreshSettings> for RefreshOptions {
    fn from(settings: &RefreshSettings) -> Self {
        Self {
            lease_wait: Duration::from_millis(settings.lease_wait_ms),
            lease_ttl: Duration::from_millis(settings.lease_ttl_ms),
            retry: RetryPolicy {
                max_attempts: settings.retry_max_attempts,
                base_delay: Duration::from_millis(settings.retry_base_delay_ms),
                multiplier: settings.retry_multiplier,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DecaySettings {
    /// Six-field cron expression for the decay cycle.
    pub cron: String,
    /// Multiplicative decay factor, strictly below one.
    pub factor: f64,
    /// Scores at or below this floor are pruned.
    pub floor: f64,
}

impl Default for DecaySettings {
    fn default() -> Self {
        Self {
            cron: DEFAULT_DECAY_CRON.to_string(),
            factor: DEFAULT_DECAY_FACTOR,
            floor: DEFAULT_DECAY_FLOOR,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeaturedSettings {
    /// Six-field cron expression for the daily WEEKLY/LEGEND rebuild.
    pub cron: String,
}

impl Default for FeaturedSettings {
    fn default() -> Self {
        Self {
            cron: DEFAULT_FEATURED_CRON.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub window: usize,
    pub failure_rate: f64,
    pub min_calls: usize,
    pub cool_down_ms: u64,
    pub half_open_trials: usize,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            window: DEFAULT_BREAKER_WINDOW,
            failure_rate: DEFAULT_BREAKER_FAILURE_RATE,
            min_calls: DEFAULT_BREAKER_MIN_CALLS,
            cool_down_ms: DEFAULT_BREAKER_COOL_DOWN_MS,
            half_open_trials: DEFAULT_BREAKER_HALF_OPEN_TRIALS,
        }
    }
}

impl From<&BreakerSettings> for BreakerConfig {
    fn from(settings: &BreakerSettings) -> Self {
        Self {
            window: settings.window,
            failure_rate: settings.failure_rate,
            min_calls: settings.min_calls,
            cool_down: Duration::from_millis(settings.cool_down_ms),
            half_open_trials: settings.half_open_trials,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnapshotSettings {
    /// Categories the snapshot cache can hold.
    pub capacity: usize,
    pub ttl_secs: u64,
    /// Ids retained per snapshot.
    pub max_ids: usize,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_SNAPSHOT_CAPACITY,
            ttl_secs: DEFAULT_SNAPSHOT_TTL_SECS,
            max_ids: DEFAULT_SNAPSHOT_MAX_IDS,
        }
    }
}

impl SnapshotSettings {
    pub fn capacity_non_zero(&self) -> std::num::NonZeroUsize {
        std::num::NonZeroUsize::new(self.capacity).unwrap_or(std::num::NonZeroUsize::MIN)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Root settings for the popularity cache.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub cache: CacheConfig,
    pub refresh: RefreshSettings,
    pub decay: DecaySettings,
    pub featured: FeaturedSettings,
    pub breaker: BreakerSettings,
    pub snapshot: SnapshotSettings,
    pub redis: RedisSettings,
}

impl Settings {
    /// Load settings from an optional TOML file overlaid with
    /// `VETRINA_*` environment variables (`__` separates nesting, e.g.
    /// `VETRINA_CACHE__FIRST_PAGE_SIZE`).
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = Config::builder();
        builder = match path {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false)),
        };
        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}
