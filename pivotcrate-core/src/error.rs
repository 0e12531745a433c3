//! Error types for pivotcrate

use thiserror::Error;

/// Main error type for pivotcrate operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),
}

/// Result type alias for pivotcrate operations
pub type Result<T> = std::result::Result<T, Error>;
