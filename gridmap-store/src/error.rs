//! Error types for store backends.

use thiserror::Error;

/// Errors returned by counter and node stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The node expired or was never registered.
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// A stored key could not be decoded.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// The backend failed (connection, protocol, ...).
    #[error("store backend failed: {0}")]
    Backend(String),

    /// Timeout waiting for the backend.
    #[error("store request timed out")]
    Timeout,
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NodeNotFound(_))
    }

    pub(crate) fn invalid_key(key: &str, reason: impl Into<String>) -> Self {
        StoreError::InvalidKey {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}
