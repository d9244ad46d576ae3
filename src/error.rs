// SPDX-License-Identifier: GPL-3.0-only
//! Error types for the application
//!
//! Brightness commands never fail the host process: expression and lookup
//! failures are values whose `Display` text is the status message returned
//! to the caller.

use thiserror::Error;

/// Forms accepted by the brightness expression grammar
pub const ACCEPTED_FORMS: &str =
    "0.5 (absolute), 50% (percent), +10% or 10%- (relative percent), +0.1 or 0.1- (relative)";

/// Failure to parse a brightness expression
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    /// Contains `%`, `+` or `-` but matches none of the accepted forms
    #[error("Invalid format: {expression:?}. Accepted forms: {}", ACCEPTED_FORMS)]
    InvalidFormat { expression: String },

    /// Shape is valid but the number is not
    #[error("Invalid number: {expression:?}")]
    InvalidNumber { expression: String },
}

/// Failure of a `set` command
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("Unknown monitor: {0}")]
    UnknownMonitor(String),

    #[error(transparent)]
    Expression(#[from] ExpressionError),
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Daemon socket protocol error
    #[error("IPC error: {0}")]
    Ipc(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_format_lists_accepted_forms() {
        let err = ExpressionError::InvalidFormat {
            expression: "1-2".to_string(),
        };
        let text = err.to_string();
        assert!(text.starts_with("Invalid format"));
        assert!(text.contains("+10%"));
        assert!(text.contains("0.1-"));
    }

    #[test]
    fn test_command_error_text() {
        assert_eq!(
            CommandError::UnknownMonitor("serial:ABC".to_string()).to_string(),
            "Unknown monitor: serial:ABC"
        );
    }
}
