//! Error types for the engine.

use thiserror::Error;

/// Engine-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid data error
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A fixed-capacity resource would overflow
    #[error("{resource} capacity exceeded: requested {requested}, capacity {capacity}")]
    CapacityExceeded {
        resource: &'static str,
        requested: u64,
        capacity: u64,
    },
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
