//! Error types for the scheduler module

use std::fmt;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
///
/// The placement index itself is total over its inputs: missing jobs and
/// empty slots degrade to not-found/zero. Errors only arise at the
/// boundary: rebuilding the index from the durable store, and validating
/// operator-supplied report parameters.
#[derive(Debug)]
pub enum SchedulerError {
    /// Startup rebuild could not read the durable store. Fatal: a
    /// partially built index would place new jobs blind to existing load.
    RebuildFailed {
        reason: String,
    },

    /// Requested distribution window is out of range
    InvalidWindow {
        hours: u32,
        max_hours: u32,
    },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RebuildFailed { reason } => {
                write!(f, "Failed to rebuild placement index: {}", reason)
            }
            Self::InvalidWindow { hours, max_hours } => {
                write!(
                    f,
                    "Invalid distribution window '{}h'. Must be 1-{}",
                    hours, max_hours
                )
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

impl SchedulerError {
    /// Create a rebuild failure error
    pub fn rebuild_failed(reason: impl Into<String>) -> Self {
        Self::RebuildFailed {
            reason: reason.into(),
        }
    }

    /// Create an invalid window error
    pub fn invalid_window(hours: u32, max_hours: u32) -> Self {
        Self::InvalidWindow { hours, max_hours }
    }

    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidWindow { .. })
    }
}
