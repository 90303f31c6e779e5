//! Logging setup shared by every subcommand.
//!
//! `RUST_LOG` takes precedence over the level chosen on the command line.

use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    /// Default
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Maps `-v` and `-q` counts. `-q` lowers the level (`Warn`, then
    /// `Error`) and wins over `-v`, which raises it (`Debug`, then `Trace`).
    pub fn from_flags(verbose: u8, quiet: u8) -> Self {
        match (quiet, verbose) {
            (0, 0) => Self::Info,
            (0, 1) => Self::Debug,
            (0, _) => Self::Trace,
            (1, _) => Self::Warn,
            _ => Self::Error,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Installs the global subscriber, failing if one is already set.
pub fn try_init(level: LogLevel) -> Result<(), String> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| e.to_string())
}
