//! Logging for the COVID hospitalization predictor
//!
//! Installs the process-wide `tracing` subscriber and provides record
//! fingerprints so that patient attributes never appear in log output.
//!
//! # Key Features
//!
//! - **Two output formats**: colored lines for development, JSON for production
//! - **`RUST_LOG` filtering**: falls back to per-crate defaults when unset
//! - **Hash-based correlation**: [`fingerprint`] replaces a patient record with
//!   a short SHA-256 prefix that is stable across events
//!
//! # Example
//!
//! ```rust,no_run
//! use logger_redacted::{fingerprint, LoggerConfig};
//! use tracing::info;
//!
//! fn main() -> Result<(), logger_redacted::LoggerError> {
//!     let config = LoggerConfig::from_env(["predictor-server"])?.verbose(false);
//!     logger_redacted::init(&config)?;
//!
//!     let record = serde_json::json!({"Age": 45, "BMI": 25.5});
//!     info!(patient = %fingerprint(&record), "Prediction requested");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod formatter;
pub mod redactor;

pub use config::*;
pub use formatter::PrettyFormatter;
pub use redactor::*;

use std::io::IsTerminal;
use thiserror::Error;
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("unknown log format '{0}', expected 'pretty' or 'json'")]
    InvalidFormat(String),

    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Install the global subscriber described by `config`.
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init(config: &LoggerConfig) -> Result<(), LoggerError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directives()));

    let (writer, is_terminal) = if config.stderr {
        (BoxMakeWriter::new(std::io::stderr), std::io::stderr().is_terminal())
    } else {
        (BoxMakeWriter::new(std::io::stdout), std::io::stdout().is_terminal())
    };

    match config.format {
        LogFormat::Pretty => {
            let use_colors = std::env::var_os("NO_COLOR").is_none() && is_terminal;
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(writer)
                        .with_ansi(use_colors)
                        .event_format(PrettyFormatter),
                )
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(writer)
                        .json()
                        .with_target(true)
                        .with_current_span(false)
                        .with_timer(ChronoUtc::rfc_3339())
                        .with_ansi(false),
                )
                .try_init()?;
        }
    }

    Ok(())
}
