//! Error types for planemesh

use thiserror::Error;

/// Main error type for planemesh operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

/// Result type alias for planemesh operations
pub type Result<T> = std::result::Result<T, Error>;
