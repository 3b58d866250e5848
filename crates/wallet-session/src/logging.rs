use std::env::VarError;

use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{fmt, EnvFilter, Layer as _};

use crate::config::LoggingConfig;
use crate::error::SessionError;

/// Build the filter: `RUST_LOG` when set, the configured directive otherwise.
///
/// A `RUST_LOG` that is set but does not parse is an error rather than a
/// silent fallback.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, SessionError> {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) => filter_from(Some(&directives), config),
        Err(VarError::NotPresent) => filter_from(None, config),
        Err(VarError::NotUnicode(_)) => Err(SessionError::Config(format!(
            "{} is not valid unicode",
            EnvFilter::DEFAULT_ENV
        ))),
    }
}

fn filter_from(env: Option<&str>, config: &LoggingConfig) -> Result<EnvFilter, SessionError> {
    match env.map(str::trim).filter(|d| !d.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives)
            .map_err(|e| SessionError::Config(format!("{}: {e}", EnvFilter::DEFAULT_ENV))),
        None => EnvFilter::try_new(&config.filter)
            .map_err(|e| SessionError::Config(format!("logging.filter: {e}"))),
    }
}

/// Install the global subscriber, writing to stderr.
///
/// Fails if the filter does not parse or a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), SessionError> {
    let filter = env_filter(config)?;

    let layer = if config.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| SessionError::Config(format!("install subscriber: {e}")))
}
