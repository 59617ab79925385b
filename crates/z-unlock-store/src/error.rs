//! Error types for z-unlock storage.

use z_unlock_core::{PurchaseId, PurchaseStatus};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of record that was looked up.
        entity: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// Credit pack has no credits left.
    #[error("credits exhausted: {purchase_id}")]
    Exhausted {
        /// The pack that is empty.
        purchase_id: PurchaseId,
    },

    /// Purchase status change not allowed by the lifecycle.
    #[error("invalid status transition for {purchase_id}: {from:?} -> {to:?}")]
    InvalidTransition {
        /// The purchase being updated.
        purchase_id: PurchaseId,
        /// The current status.
        from: PurchaseStatus,
        /// The requested status.
        to: PurchaseStatus,
    },
}

impl StoreError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Database(_))
    }

    pub(crate) fn purchase_not_found(id: &PurchaseId) -> Self {
        Self::NotFound {
            entity: "purchase",
            id: id.to_string(),
        }
    }

    pub(crate) fn credit_pack_not_found(id: &PurchaseId) -> Self {
        Self::NotFound {
            entity: "credit pack",
            id: id.to_string(),
        }
    }
}
