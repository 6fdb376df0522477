//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber once at startup
//! - Pick the output format (pretty for development, JSON for production)
//! - Honour `RUST_LOG` over the configured level
//!
//! Log lines are local only; spans exported to the collector come from the
//! OpenTelemetry pipeline, not from this subscriber.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;
use crate::observability::TelemetryError;

/// Install the global log subscriber.
pub fn init_logging(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let filter = build_filter(&config.level)?;

    let result = if config.format == "json" {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().json().with_filter(filter))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_filter(filter))
            .try_init()
    };

    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

fn build_filter(level: &str) -> Result<EnvFilter, TelemetryError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| TelemetryError::LoggingInit(format!("Invalid log level {level:?}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_level_is_parsed() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        assert!(build_filter("roshambo=debug,tower_http=warn").is_ok());
        assert!(build_filter("roshambo=loudest").is_err());
    }
}
