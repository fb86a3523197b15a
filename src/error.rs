use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the lifecycle engine and its collaborators.
///
/// The first five variants are the engine's own taxonomy; the rest only occur
/// at the boundary (command parsing, output, timeouts).
#[derive(Error, Debug)]
pub enum LoanError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    LimitExceeded(String),
    #[error("Store error: {0}")]
    StoreError(String),
    #[error("Notification error: {0}")]
    NotificationError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl LoanError {
    pub fn error_code(&self) -> &'static str {
        match self {
            LoanError::NotFound(_) => "NOT_FOUND",
            LoanError::InvalidState(_) => "INVALID_STATE",
            LoanError::LimitExceeded(_) => "LIMIT_EXCEEDED",
            LoanError::StoreError(_) => "STORE_ERROR",
            LoanError::NotificationError(_) => "NOTIFICATION_ERROR",
            LoanError::ValidationError(_) => "VALIDATION_ERROR",
            LoanError::Timeout(_) => "TIMEOUT",
            LoanError::CsvError(_) | LoanError::JsonError(_) | LoanError::IoError(_) => {
                "INTERNAL_ERROR"
            }
        }
    }

    /// HTTP-equivalent status for whatever boundary wraps the engine.
    pub fn http_status(&self) -> u16 {
        match self {
            LoanError::NotFound(_) => 404,
            LoanError::InvalidState(_)
            | LoanError::LimitExceeded(_)
            | LoanError::ValidationError(_) => 400,
            LoanError::Timeout(_) => 504,
            _ => 500,
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for LoanError {
    fn from(err: rocksdb::Error) -> Self {
        LoanError::StoreError(err.to_string())
    }
}

impl From<reqwest::Error> for LoanError {
    fn from(err: reqwest::Error) -> Self {
        LoanError::NotificationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LoanError>;
