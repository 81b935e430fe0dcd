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
            "newsgate_cache_hit_total",
            Unit::Count,
            "Cache lookups answered from a namespace."
        );
        describe_counter!(
            "newsgate_cache_miss_total",
            Unit::Count,
            "Cache lookups that found nothing usable."
        );
        describe_counter!(
            "newsgate_cache_evict_total",
            Unit::Count,
            "Entries removed by trimming or age purges."
        );
        describe_counter!(
            "newsgate_network_failure_total",
            Unit::Count,
            "Upstream fetches that timed out, failed or returned a non-2xx status."
        );
        describe_counter!(
            "newsgate_offline_fallback_total",
            Unit::Count,
            "Responses synthesized because neither network nor cache could answer."
        );
        describe_counter!(
            "newsgate_revalidate_total",
            Unit::Count,
            "Cached entries refreshed in the background."
        );
        describe_counter!(
            "newsgate_cache_write_dropped_total",
            Unit::Count,
            "Cache writes abandoned after a storage error."
        );
        describe_histogram!(
            "newsgate_upstream_fetch_ms",
            Unit::Milliseconds,
            "Upstream round-trip latency in milliseconds."
        );
    });
}
