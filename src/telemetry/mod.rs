//! Telemetry initialization: structured logging

use crate::config::TelemetryConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "auth9_mailer=info";

/// Install the global tracing subscriber.
///
/// Returns `false` when a subscriber was already installed, which leaves the
/// existing one in place.
pub fn init(config: &TelemetryConfig) -> bool {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_FILTER.into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if config.log_format == "json" {
        // Flatten event fields so `message` is top-level in JSON output
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true);
        registry.with(fmt_layer).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.is_ok()
}
