use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, filter::LevelFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from(logging.level).into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "vetrina_cache_hit_total",
            Unit::Count,
            "Category listing reads served from the cache store."
        );
        describe_counter!(
            "vetrina_cache_miss_total",
            Unit::Count,
            "Category listing reads that fell back to the durable store."
        );
        describe_counter!(
            "vetrina_fallback_total",
            Unit::Count,
            "Fallback reads by tier (snapshot or durable)."
        );
        describe_counter!(
            "vetrina_breaker_transition_total",
            Unit::Count,
            "Circuit breaker state transitions by target state."
        );
        describe_counter!(
            "vetrina_refresh_dropped_total",
            Unit::Count,
            "Refresh triggers dropped because the queue was full."
        );
        describe_counter!(
            "vetrina_decay_pruned_total",
            Unit::Count,
            "Realtime score entries pruned at or below the decay floor."
        );
        describe_histogram!(
            "vetrina_refresh_ms",
            Unit::Milliseconds,
            "Category rebuild latency in milliseconds."
        );
        describe_histogram!(
            "vetrina_decay_ms",
            Unit::Milliseconds,
            "Decay cycle latency in milliseconds."
        );
    });
}
