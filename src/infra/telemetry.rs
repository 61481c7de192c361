use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache::metrics::{
    PAGE_CACHE_ENTRIES, PAGE_CACHE_EVICT, PAGE_CACHE_EXPIRED, PAGE_CACHE_HIT, PAGE_CACHE_MISS,
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
            PAGE_CACHE_HIT,
            Unit::Count,
            "Index page renders served from the page cache."
        );
        describe_counter!(
            PAGE_CACHE_MISS,
            Unit::Count,
            "Index page renders that had to be generated."
        );
        describe_counter!(
            PAGE_CACHE_EXPIRED,
            Unit::Count,
            "Page cache entries dropped after their timeout."
        );
        describe_counter!(
            PAGE_CACHE_EVICT,
            Unit::Count,
            "Page cache entries evicted due to capacity."
        );
        describe_gauge!(
            PAGE_CACHE_ENTRIES,
            Unit::Count,
            "Entries currently held by the page cache."
        );
    });
}
