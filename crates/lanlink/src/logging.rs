//! Stderr diagnostics for the CLI.
//!
//! Stdout belongs to the data plane (readiness, events and responses in
//! the selected `--format`), so everything `tracing` emits goes to
//! stderr, including backend stdout/stderr re-logged by the session
//! supervisor. `--log-level` sets a global floor; `LANLINK_LOG` accepts a
//! full filter expression to override it, e.g.
//! `LANLINK_LOG=info,lanlink_session=trace` while chasing a backend
//! handshake problem.

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter expression.
pub const LOG_FILTER_ENV: &str = "LANLINK_LOG";

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

pub fn init_logging(format: LogFormat, level: LogLevel) {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(level.as_directive()));

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_level_is_a_valid_filter_directive() {
        for level in [
            LogLevel::Error,
            LogLevel::Warn,
            LogLevel::Info,
            LogLevel::Debug,
            LogLevel::Trace,
        ] {
            let directive = level.as_directive();
            assert!(
                EnvFilter::try_new(directive).is_ok(),
                "{directive} did not parse"
            );
        }
    }

    #[test]
    fn per_crate_override_expression_parses() {
        assert!(EnvFilter::try_new("info,lanlink_session=trace").is_ok());
    }
}
