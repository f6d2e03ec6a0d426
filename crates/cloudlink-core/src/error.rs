//! Shared error type across cloudlink crates.

use thiserror::Error;

/// Stable error codes surfaced to callers and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Missing or over-long cmd, bad key, bad option.
    InvalidArg,
    /// Envelope exceeded the writer capacity.
    TooLarge,
    /// Publisher refused the job.
    Busy,
    /// No handler for an inbound command.
    NotFound,
    /// Malformed inbound envelope.
    Parse,
    /// I/O and other unexpected failures.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and statistics.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidArg => "INVALID_ARG",
            ErrorCode::TooLarge => "TOO_LARGE",
            ErrorCode::Busy => "BUSY",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Parse => "PARSE",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, CloudError>;

/// Unified error type used by core and service.
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("invalid argument: {0}")]
    InvalidArg(String),
    #[error("envelope too large: {size} bytes exceeds capacity {capacity}")]
    TooLarge { size: usize, capacity: usize },
    #[error("publisher busy")]
    Busy,
    #[error("no handler for command: {0}")]
    NotFound(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl CloudError {
    /// Map the error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            CloudError::InvalidArg(_) => ErrorCode::InvalidArg,
            CloudError::TooLarge { .. } => ErrorCode::TooLarge,
            CloudError::Busy => ErrorCode::Busy,
            CloudError::NotFound(_) => ErrorCode::NotFound,
            CloudError::Parse(_) => ErrorCode::Parse,
            CloudError::Internal(_) => ErrorCode::Internal,
        }
    }
}
