use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
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
        .with_default_directive(logging.level.into())
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

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "bistro_cache_hit_total",
            Unit::Count,
            "Total number of cache region hits."
        );
        describe_counter!(
            "bistro_cache_miss_total",
            Unit::Count,
            "Total number of cache region misses, undecodable payloads included."
        );
        describe_counter!(
            "bistro_cache_store_unavailable_total",
            Unit::Count,
            "Cache store calls skipped because the store was unreachable or timed out."
        );
        describe_counter!(
            "bistro_cache_store_error_total",
            Unit::Count,
            "Cache store calls rejected by a reachable store."
        );
        describe_counter!(
            "bistro_rate_limit_rejected_total",
            Unit::Count,
            "Requests rejected by the rate limiter."
        );
    });
}
