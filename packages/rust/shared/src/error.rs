//! Error types for Underwrite.
//!
//! Library crates use [`UnderwriteError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Underwrite operations.
#[derive(Debug, thiserror::Error)]
pub enum UnderwriteError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to an external service.
    #[error("network error: {0}")]
    Network(String),

    /// Response decoding error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// A single data source lookup failed.
    #[error("source error ({source_name}): {message}")]
    Source {
        source_name: String,
        message: String,
    },

    /// Text generation error (API or response shape).
    #[error("generation error: {0}")]
    Generation(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, UnderwriteError>;

impl UnderwriteError {
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

    /// Create a source-scoped error.
    pub fn source(source_name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Source {
            source_name: source_name.into(),
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

    /// The detail text embedded into an aggregate context.
    ///
    /// Source errors drop the `source error (...)` prefix since the
    /// context already names the source.
    pub fn detail(&self) -> String {
        match self {
            Self::Source { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = UnderwriteError::config("missing project id");
        assert_eq!(err.to_string(), "config error: missing project id");

        let err = UnderwriteError::validation("input text is empty");
        assert!(err.to_string().contains("input text is empty"));
    }

    #[test]
    fn source_error_detail_strips_prefix() {
        let err = UnderwriteError::source("Realtor Market Data", "Permission Denied");
        assert_eq!(
            err.to_string(),
            "source error (Realtor Market Data): Permission Denied"
        );
        assert_eq!(err.detail(), "Permission Denied");

        let err = UnderwriteError::Network("connection reset".into());
        assert_eq!(err.detail(), "network error: connection reset");
    }
}
