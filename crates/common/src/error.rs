use serde::Serialize;
use thiserror::Error;

/// Unified error type for Floe crates.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Type mismatch on column '{column}': expected {expected}, found {found}")]
    TypeMismatch { column: String, expected: String, found: String },
    #[error("Operation not supported: {0}")]
    NotSupported(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Stable, machine-readable error codes surfaced to the host runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MalformedRequest,
    BackendUnavailable,
    TypeMismatch,
    NotSupported,
    Configuration,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MalformedRequest => "MALFORMED_REQUEST",
            ErrorCode::BackendUnavailable => "BACKEND_UNAVAILABLE",
            ErrorCode::TypeMismatch => "TYPE_MISMATCH",
            ErrorCode::NotSupported => "NOT_SUPPORTED",
            ErrorCode::Configuration => "CONFIGURATION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedRequest(msg.into())
    }

    /// Wraps a driver failure. Only the message is kept so backend stack
    /// traces never leak into the surfaced error.
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Error::Backend(err.to_string())
    }

    pub fn type_mismatch(
        column: impl Into<String>,
        expected: impl std::fmt::Display,
        found: impl std::fmt::Display,
    ) -> Self {
        Error::TypeMismatch {
            column: column.into(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Error::MalformedRequest(_) => ErrorCode::MalformedRequest,
            Error::Backend(_) => ErrorCode::BackendUnavailable,
            Error::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            Error::NotSupported(_) => ErrorCode::NotSupported,
            Error::Config(_) => ErrorCode::Configuration,
            Error::Internal(_) => ErrorCode::Internal,
        }
    }
}
