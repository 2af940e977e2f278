use serde::{Deserialize, Serialize};
use std::fmt;

/// Single structured error shape used across all core layers and exposed to
/// the UI shell unchanged. `code` values are stable contract strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    /// Missing incident or report version.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    /// Concurrent-write race detected; safe for the caller to retry.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message).with_retryable(true)
    }

    /// Customer-notification gate failed; recoverable once approval exists.
    pub fn approval_required(message: impl Into<String>) -> Self {
        Self::new("APPROVAL_REQUIRED", message)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}
