//! Error taxonomy for the task engine.
//!
//! Three kinds of failure can surface from a mutation: validation (caught
//! before any side effect runs), persistence (the store rejected a write),
//! and not-found (the target task no longer exists). None of them are fatal
//! to the process; the caller reports them and may retry.

use thiserror::Error;

/// Errors produced by the engine and the storage layer.
#[derive(Debug, Error)]
pub enum Error {
    /// A required task field was missing or empty before save.
    #[error("validation failed: {0} is required")]
    Validation(&'static str),

    /// The mutation targeted a task id the store does not have.
    #[error("task {0} not found")]
    NotFound(String),

    /// The store was unreachable or rejected the write.
    #[error("persistence failed: {0}")]
    Persistence(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Persistence(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
