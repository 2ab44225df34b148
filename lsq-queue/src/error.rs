//! Error types for lsq-queue
//!
//! Module-specific error types using thiserror. Apart from restore, queue and
//! tracker operations log these at the boundary and degrade to "no change".

use thiserror::Error;

/// Main error type for lsq-queue
#[derive(Error, Debug)]
pub enum Error {
    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Manual queue store failures
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog file decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience Result type using lsq-queue Error
pub type Result<T> = std::result::Result<T, Error>;
