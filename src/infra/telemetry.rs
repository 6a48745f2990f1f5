use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

/// Every metric the server emits, described once at startup.
const METRICS: &[(&str, MetricKind, Unit, &str)] = &[
    (
        "hearth_post_mutation_total",
        MetricKind::Counter,
        Unit::Count,
        "Post document mutations applied, labelled by operation.",
    ),
    (
        "hearth_relationship_mutation_total",
        MetricKind::Counter,
        Unit::Count,
        "Friend and follow transitions applied, labelled by operation.",
    ),
    (
        "hearth_mutation_rejected_total",
        MetricKind::Counter,
        Unit::Count,
        "Mutations refused by a domain rule, labelled by kind.",
    ),
    (
        "hearth_moderation_decision_total",
        MetricKind::Counter,
        Unit::Count,
        "Moderation decisions, labelled approve or reject.",
    ),
    (
        "hearth_api_rate_limited_total",
        MetricKind::Counter,
        Unit::Count,
        "API requests refused by the rate limiter, including repeated bad session tokens.",
    ),
    (
        "hearth_sessions_purged",
        MetricKind::Gauge,
        Unit::Count,
        "Expired sessions removed by the last purge sweep.",
    ),
    (
        "hearth_db_transaction_ms",
        MetricKind::Histogram,
        Unit::Milliseconds,
        "Latency of multi-document store transactions in milliseconds.",
    ),
];

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        for &(name, kind, unit, help) in METRICS {
            match kind {
                MetricKind::Counter => describe_counter!(name, unit, help),
                MetricKind::Gauge => describe_gauge!(name, unit, help),
                MetricKind::Histogram => describe_histogram!(name, unit, help),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn metric_names_are_unique_and_namespaced() {
        let mut seen = HashSet::new();
        for (name, kind, unit, help) in METRICS {
            assert!(name.starts_with("hearth_"), "{name}");
            assert!(seen.insert(*name), "duplicate metric {name}");
            assert!(!help.is_empty(), "{name} lacks a description");
            if name.ends_with("_total") {
                assert_eq!(*kind, MetricKind::Counter, "{name}");
            }
            if name.ends_with("_ms") {
                assert_eq!(*unit, Unit::Milliseconds, "{name}");
            }
        }
    }

    #[test]
    fn describing_twice_is_harmless() {
        describe_metrics();
        describe_metrics();
    }
}
