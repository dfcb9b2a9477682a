//! EagleTunnel Logging
//!
//! One place to install the `tracing` subscriber. `RUST_LOG` wins over the
//! level passed in when it is set.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::{fmt as fmt_layer, prelude::*, EnvFilter};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Unknown log level: {0}")]
    UnknownLevel(String),

    #[error("Logging already initialised: {0}")]
    AlreadyInitialised(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Default filter directives: `level` everywhere, one step more verbose
    /// for the node's own crates below `info`.
    fn directives(&self) -> String {
        match self {
            Self::Info => "info,eagletunnel=debug".to_string(),
            other => other.as_str().to_string(),
        }
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(LoggingError::UnknownLevel(s.to_string())),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directives()))
}

/// Install the global subscriber, failing if one is already set.
pub fn try_init(level: LogLevel) -> Result<(), LoggingError> {
    tracing_subscriber::registry()
        .with(fmt_layer::layer())
        .with(filter(level))
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialised(e.to_string()))
}

/// Install the global subscriber; a second call is a no-op.
pub fn init(level: LogLevel) {
    let _ = try_init(level);
}
