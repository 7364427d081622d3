//! Error types for the ingestion pipeline.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while processing a file.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error.
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// Database error.
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    /// Watch backend error.
    #[error("Watch backend error: {0}")]
    Watch(#[from] notify::Error),
}

impl Error {
    /// Whether the failure is operational rather than a property of the
    /// file's data. Retryable failures leave the file in the watched
    /// directory; everything else quarantines it.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Db(_))
    }
}
