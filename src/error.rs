use std::result;

use crate::retry::RetryableError;
use thiserror::Error;

/// Error types for harvester operations
#[derive(Error, Debug)]
pub enum HarvestError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    /// XML parsing failed
    #[error("XML parsing failed: {0}")]
    XmlError(String),

    /// SQLite operation failed
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// CSV reading or writing failed
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// IO error for file operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic API error with HTTP status code
    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    /// Invalid PMID format
    #[error("Invalid PMID format: {pmid}")]
    InvalidPmid { pmid: String },

    /// Search term is empty or otherwise unusable
    #[error("Invalid search term: {0:?}")]
    InvalidTerm(String),

    /// Requested result cap is outside what ESearch can return
    #[error("Invalid result limit: requested {requested}, allowed 1..={maximum}")]
    InvalidLimit { requested: usize, maximum: usize },

    /// Term source is missing the expected column
    #[error("Column '{column}' not found in {source_name}")]
    MissingColumn { column: String, source_name: String },
}

pub type Result<T> = result::Result<T, HarvestError>;

impl RetryableError for HarvestError {
    fn is_retryable(&self) -> bool {
        match self {
            HarvestError::RequestError(err) => {
                if err.is_timeout() || err.is_connect() {
                    return true;
                }

                if let Some(status) = err.status() {
                    return status.is_server_error() || status.as_u16() == 429;
                }

                !err.is_builder() && !err.is_redirect() && !err.is_decode()
            }

            HarvestError::ApiError { status, .. } => (500..600).contains(status) || *status == 429,

            HarvestError::JsonError(_)
            | HarvestError::XmlError(_)
            | HarvestError::DatabaseError(_)
            | HarvestError::CsvError(_)
            | HarvestError::IoError(_)
            | HarvestError::InvalidPmid { .. }
            | HarvestError::InvalidTerm(_)
            | HarvestError::InvalidLimit { .. }
            | HarvestError::MissingColumn { .. } => false,
        }
    }

    fn retry_reason(&self) -> &str {
        match self {
            HarvestError::RequestError(err) if err.is_timeout() => "Request timeout",
            HarvestError::RequestError(err) if err.is_connect() => "Connection error",
            HarvestError::RequestError(_) => "Network error",
            HarvestError::ApiError { status: 429, .. } => "Rate limit exceeded",
            HarvestError::ApiError { status, .. } if (500..600).contains(status) => {
                "Server error"
            }
            HarvestError::ApiError { .. } => "API error",
            HarvestError::JsonError(_) => "Invalid JSON response",
            HarvestError::XmlError(_) => "Invalid XML response",
            HarvestError::DatabaseError(_) => "Database error",
            HarvestError::CsvError(_) | HarvestError::IoError(_) => "File system error",
            HarvestError::InvalidPmid { .. }
            | HarvestError::InvalidTerm(_)
            | HarvestError::InvalidLimit { .. }
            | HarvestError::MissingColumn { .. } => "Invalid input",
        }
    }
}
