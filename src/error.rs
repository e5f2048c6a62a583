//! Library error types
//!
//! Errors raised by the harness itself, as opposed to test outcomes.

use thiserror::Error;

/// Harness errors
#[derive(Error, Debug)]
pub enum QaError {
    #[error("Unknown concurrency mode: {0} (expected single, thread or process)")]
    UnknownMode(String),

    #[error("Invalid filter pattern {pattern:?}: {source}")]
    InvalidFilter {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Failed to read config file {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ConfigParse { path: String, message: String },

    #[error("Test case {0} is not registered; it cannot run in a worker process")]
    Unregistered(String),

    #[error("Worker protocol error: {0}")]
    WorkerProtocol(String),
}

pub type QaResult<T> = std::result::Result<T, QaError>;
