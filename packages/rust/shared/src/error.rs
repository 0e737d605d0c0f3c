//! Error types for Pathwise.
//!
//! Library crates use [`PathwiseError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Pathwise operations.
#[derive(Debug, thiserror::Error)]
pub enum PathwiseError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport or service failure talking to the research service.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The research response lacked the mandatory fields or could not be read.
    #[error("malformed upstream response: {message}")]
    MalformedResponse { message: String },

    /// A canonical record was built but failed the integrity checks.
    #[error("integrity rejected: {message}")]
    IntegrityRejected { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error (bad entity file, empty title, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PathwiseError>;

impl PathwiseError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a malformed-response error from any displayable message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: msg.into(),
        }
    }

    /// Create an integrity rejection from any displayable message.
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::IntegrityRejected {
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

    /// Short machine-readable label, used in outcome reasons and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::IntegrityRejected { .. } => "integrity_rejected",
            Self::Storage(_) => "storage",
            Self::Io { .. } => "io",
            Self::Validation { .. } => "validation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = PathwiseError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = PathwiseError::rejected("salary.entry min exceeds max");
        assert!(err.to_string().contains("salary.entry"));
    }

    #[test]
    fn error_kinds() {
        assert_eq!(
            PathwiseError::UpstreamUnavailable("timeout".into()).kind(),
            "upstream_unavailable"
        );
        assert_eq!(PathwiseError::malformed("x").kind(), "malformed_response");
        assert_eq!(PathwiseError::rejected("x").kind(), "integrity_rejected");
    }
}
