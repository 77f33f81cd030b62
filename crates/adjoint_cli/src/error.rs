//! CLI error types.

use adjoint_core::AdjointError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced by the `adjoint` binary.
#[derive(Debug, Error)]
pub enum CliError {
    /// Engine failure while recording or differentiating a model.
    #[error("Engine error: {0}")]
    Adjoint(#[from] AdjointError),

    /// Configuration could not be loaded or validated.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding of a report failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A command-line argument could not be interpreted.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// One or more derivative checks did not reach their expected rate.
    #[error("{failed} of {total} checks failed")]
    ChecksFailed {
        /// Number of failing checks.
        failed: usize,
        /// Number of checks run.
        total: usize,
    },
}

/// Result alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_converts() {
        let err: CliError = AdjointError::StaleEvaluation.into();
        assert!(matches!(err, CliError::Adjoint(AdjointError::StaleEvaluation)));
        assert!(err.to_string().starts_with("Engine error"));
    }

    #[test]
    fn test_checks_failed_message() {
        let err = CliError::ChecksFailed {
            failed: 1,
            total: 9,
        };
        assert_eq!(err.to_string(), "1 of 9 checks failed");
    }
}
