use std::io;
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
///
/// Log lines go to stderr; stdout is reserved for command output.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(io::stderr)
            .with_target(true)
            .boxed(),
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
            "contextualizer_cache_hit_total",
            Unit::Count,
            "Total number of namespaced cache hits."
        );
        describe_counter!(
            "contextualizer_cache_miss_total",
            Unit::Count,
            "Total number of namespaced cache misses that ran a populate callback."
        );
        describe_counter!(
            "contextualizer_cache_bypass_total",
            Unit::Count,
            "Total number of lookups served without caching because the medium was unavailable."
        );
        describe_counter!(
            "contextualizer_cache_evict_total",
            Unit::Count,
            "Total number of medium entries evicted due to capacity."
        );
        describe_histogram!(
            "contextualizer_cache_populate_ms",
            Unit::Milliseconds,
            "Populate callback latency in milliseconds."
        );
        describe_counter!(
            "contextualizer_visibility_total",
            Unit::Count,
            "Total number of visibility decisions, labelled by decision."
        );
    });
}
