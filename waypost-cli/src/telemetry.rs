//! Log subscriber installation.
//!
//! Library crates log through the `log` facade; the subscriber bridges those
//! records and writes them to stderr so command output on stdout stays
//! machine-readable.

use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;

/// Failure to install the log subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The log level is not a valid filter directive.
    #[error("invalid log level/filter {value:?}")]
    Filter {
        /// Directive supplied.
        value: String,
        /// Parser failure.
        #[source]
        source: ParseError,
    },
    /// A global subscriber is already installed.
    #[error("failed to install log subscriber: {0}")]
    Install(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Build the filter, preferring a valid `env` directive over `level`.
pub(crate) fn filter_for(level: &str, env: Option<&str>) -> Result<EnvFilter, TelemetryError> {
    if let Some(filter) = env.and_then(|directive| EnvFilter::try_new(directive).ok()) {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|source| TelemetryError::Filter {
        value: level.to_owned(),
        source,
    })
}

/// Install the global subscriber using `RUST_LOG` or `level`.
pub(crate) fn init(level: &str) -> Result<(), TelemetryError> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = filter_for(level, env.as_deref())?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(TelemetryError::Install)
}
