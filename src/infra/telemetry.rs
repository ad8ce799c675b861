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
            "mapperlab_cache_l1_hit_total",
            Unit::Count,
            "Total number of session cache hits."
        );
        describe_counter!(
            "mapperlab_cache_l2_hit_total",
            Unit::Count,
            "Total number of namespace cache hits, labelled by namespace."
        );
        describe_counter!(
            "mapperlab_cache_l2_miss_total",
            Unit::Count,
            "Total number of namespace cache misses, labelled by namespace."
        );
        describe_counter!(
            "mapperlab_cache_l2_evict_total",
            Unit::Count,
            "Total number of namespace cache evictions due to capacity."
        );
        describe_counter!(
            "mapperlab_cache_l2_flush_total",
            Unit::Count,
            "Total number of namespace cache flushes caused by writes."
        );
        describe_histogram!(
            "mapperlab_sql_cost_ms",
            Unit::Milliseconds,
            "Raw statement execution time in milliseconds, labelled by statement id."
        );
        describe_counter!(
            "mapperlab_sql_slow_total",
            Unit::Count,
            "Total number of statements at or above the slow threshold."
        );
        describe_counter!(
            "mapperlab_policy_violation_total",
            Unit::Count,
            "Total number of writes rejected by the full-table modification guard."
        );
    });
}
