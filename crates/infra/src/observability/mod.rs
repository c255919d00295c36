//! Tracing subscriber setup
//!
//! Libraries in this workspace only emit `tracing` events. Applications call
//! [`init_tracing`] once at startup to decide where those events go.

use authkeep_domain::constants::DEFAULT_LOG_LEVEL;
use authkeep_domain::{LogFormat, LoggingConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber described by `config`
///
/// `RUST_LOG` takes precedence over `config.level`. An unparsable level
/// falls back to `info`. Returns `false` when a global subscriber was
/// already installed, in which case nothing changes.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let registry = tracing_subscriber::registry().with(env_filter(&config.level));

    let installed = match config.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init(),
    };

    match installed {
        Ok(()) => {
            tracing::debug!(level = %config.level, format = %config.format, "Tracing initialised");
            true
        }
        Err(_) => false,
    }
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
}
