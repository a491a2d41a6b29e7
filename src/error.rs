//! Error types for the event instance store.
//!
//! This module defines all error types used throughout the crate,
//! providing clear and actionable error messages.

use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for event store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the event instance store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Store Errors
    // ═══════════════════════════════════════════════════════════════════

    /// The batch write did not commit; nothing was applied
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// The store was torn down before the operation could run
    #[error("Event store is no longer available")]
    StoreUnavailable,

    /// A blocking store call was issued from inside a subscriber callback
    #[error("Blocking store call issued from the store worker thread")]
    ReentrantCall,

    // ═══════════════════════════════════════════════════════════════════
    // Validation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Address text could not be parsed
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    // ═══════════════════════════════════════════════════════════════════
    // Serialization Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ═══════════════════════════════════════════════════════════════════
    // Internal Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Internal error (should not happen in production)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Lock acquisition failed
    #[error("Failed to acquire lock")]
    Lock,

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Check if this error means the store can no longer serve requests
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::StoreUnavailable)
    }

    /// Collapse a backend failure into the write failure reported to callers
    pub fn into_write_failure(self) -> Self {
        match self {
            Error::WriteFailed(_) => self,
            other => Error::WriteFailed(other.to_string()),
        }
    }
}
