//! Error handling types for the conflict tracker.
//!
//! Errors are `Clone` because a single debounce cycle settles once and hands the
//! same outcome to every caller that was coalesced into it.

use std::sync::PoisonError;
use thiserror::Error;

/// Failure reported by the scan collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ScanError {
    pub message: String,
}

impl ScanError {
    pub fn new(message: impl Into<String>) -> Self {
        ScanError {
            message: message.into(),
        }
    }
}

/// Comprehensive error type for tracker operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    /// The precheck or full scan failed
    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),

    /// The cycle was abandoned before it could deliver a result
    #[error("Request cancelled for {key}")]
    Cancelled { key: String },

    /// The tracker has been disposed
    #[error("Conflict tracker has been disposed")]
    Disposed,

    /// Configuration error
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for tracker operations
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Helper trait to recover the guard from a poisoned lock.
pub trait LockResultExt<T> {
    /// Convert a PoisonError into the inner guard, logging the recovery.
    ///
    /// The context parameter identifies which operation triggered lock recovery.
    fn recover_poison(self, context: &str) -> T;
}

impl<T> LockResultExt<T> for Result<T, PoisonError<T>> {
    fn recover_poison(self, context: &str) -> T {
        match self {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!(
                    target: "conflict_tracker::lock_recovery",
                    "Recovered from poisoned lock in {}",
                    context
                );
                poisoned.into_inner()
            }
        }
    }
}

impl TrackerError {
    /// Create a cancellation error for the given key
    pub fn cancelled(key: impl Into<String>) -> Self {
        TrackerError::Cancelled { key: key.into() }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        TrackerError::Config {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        TrackerError::Internal(message.into())
    }
}
