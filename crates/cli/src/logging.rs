//! Tracing subscriber setup for the CLI.
//!
//! Logs go to stderr so command output on stdout stays machine-readable.
//! `RUST_LOG` overrides the default filter.

use clap::ValueEnum;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info,stowage_core=info,stowage_client=info,stowage_cli=info";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Text,
    /// JSON lines for log shippers.
    Json,
}

/// Install the global subscriber. Call once at startup.
pub fn init_logging(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
                .init();
        }
    }
}
