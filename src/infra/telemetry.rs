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
            "startupcoders_cache_hit_total",
            Unit::Count,
            "Total number of cache reads answered from a stored entry, by freshness state."
        );
        describe_counter!(
            "startupcoders_cache_miss_total",
            Unit::Count,
            "Total number of cache reads that fetched before returning."
        );
        describe_counter!(
            "startupcoders_cache_refresh_failed_total",
            Unit::Count,
            "Total number of background refreshes whose fetch failed."
        );
        describe_counter!(
            "startupcoders_cache_swept_total",
            Unit::Count,
            "Total number of entries removed by cleanup sweeps."
        );
        describe_counter!(
            "startupcoders_cache_invalidated_total",
            Unit::Count,
            "Total number of entries removed by invalidation after writes."
        );
    });
}
