//! Unified error handling for the jangdan crate
//!
//! The scheduler core's data-structure operations are total and never
//! fail; everything fallible lives at the boundaries: the durable store,
//! configuration, and request validation. This module wraps those into a
//! single [`Error`] usable across module seams.

use std::io;
use thiserror::Error;

// Re-export the domain-specific error for convenience
pub use crate::scheduler::error::SchedulerError;

/// Unified error type for the jangdan crate
#[derive(Error, Debug)]
pub enum Error {
    /// Scheduler and placement errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Rejected caller input
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Job lookup miss surfaced to the API layer
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Scheduler(e) => e.is_recoverable(),
            Self::Database(_) => false,
            Self::Io(_) => true, // I/O errors are often transient
            Self::Json(_) => false,
            Self::Config(_) => false,
            Self::InvalidRequest(_) => false,
            Self::JobNotFound(_) => false,
            Self::Other { .. } => false,
        }
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: err.to_string(),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
