//! Error types for EventHarvest.
//!
//! Library crates use [`EventHarvestError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all EventHarvest operations.
#[derive(Debug, thiserror::Error)]
pub enum EventHarvestError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while rendering a page or talking to a store.
    #[error("network error: {0}")]
    Network(String),

    /// Malformed input that could not be parsed (URLs, stored timestamps).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Backing store error (local database or remote table).
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Well-formed input with a value outside what is accepted.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, EventHarvestError>;

impl EventHarvestError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = EventHarvestError::config("SUPABASE_URL is not set");
        assert_eq!(err.to_string(), "config error: SUPABASE_URL is not set");

        let err = EventHarvestError::Network("https://example.com: HTTP 503".into());
        assert!(err.to_string().starts_with("network error:"));
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn io_error_carries_path() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = EventHarvestError::io("/tmp/data.json", source);
        let msg = err.to_string();
        assert!(msg.contains("data.json"));
        assert!(msg.contains("gone"));
    }
}
