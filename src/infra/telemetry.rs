use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "cache_hit_total",
            Unit::Count,
            "Total number of cache hits, labelled by entry kind."
        );
        describe_counter!(
            "cache_miss_total",
            Unit::Count,
            "Total number of cache misses, labelled by entry kind."
        );
        describe_counter!(
            "cache_evict_total",
            Unit::Count,
            "Total number of cache evictions due to capacity."
        );
        describe_counter!(
            "cache_stale_fill_skipped_total",
            Unit::Count,
            "Cache fills discarded because an invalidation ran during their fetch."
        );
        describe_counter!(
            "cache_invalidation_total",
            Unit::Count,
            "Total number of successful tag or path invalidations."
        );
        describe_counter!(
            "cache_invalidation_failed_total",
            Unit::Count,
            "Total number of tag or path invalidations that failed."
        );
        describe_histogram!(
            "revalidation_ms",
            Unit::Milliseconds,
            "Time spent applying one revalidation plan."
        );
        describe_histogram!(
            "content_fetch_duration_ms",
            Unit::Milliseconds,
            "Record store fetch latency on cache misses, labelled by domain."
        );
        describe_counter!(
            "backend_request_total",
            Unit::Count,
            "Record store requests, labelled by operation and outcome."
        );
    });
}
