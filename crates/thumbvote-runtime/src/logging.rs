//! Structured logging setup
//!
//! Installs a global tracing subscriber filtered by `RUST_LOG` (falling back
//! to `thumbvote=info`). Subsequent calls are no-ops.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

/// Filter used when `RUST_LOG` is unset or invalid
pub const DEFAULT_FILTER: &str = "thumbvote=info";

static INSTALLED: OnceLock<LogFormat> = OnceLock::new();

/// Output encoding
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable single-line records
    #[default]
    Compact,
    /// One JSON object per record
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(LoggingError::UnknownFormat(s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Unknown log format: {0}")]
    UnknownFormat(String),

    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Install the global subscriber
///
/// Returns the format that is active, which may differ from `format` when
/// logging was already initialized.
pub fn init(format: LogFormat) -> Result<LogFormat, LoggingError> {
    if let Some(active) = INSTALLED.get() {
        return Ok(*active);
    }

    let registry = Registry::default().with(build_env_filter());
    match format {
        LogFormat::Compact => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().compact()))?
        }
        LogFormat::Json => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))?
        }
    }
    let active = *INSTALLED.get_or_init(|| format);

    tracing::info!(format = ?active, "logging initialized");
    Ok(active)
}

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_init_is_idempotent() {
        let first = init(LogFormat::Compact).unwrap();
        let second = init(LogFormat::Json).unwrap();
        assert_eq!(first, second);
    }
}
