//! Error types for z-unlock.

use crate::ids::IdError;
use crate::PurchaseStatus;

/// Result type for z-unlock operations.
pub type Result<T> = std::result::Result<T, UnlockError>;

/// Errors raised by the core types.
///
/// Entitlement resolution itself never fails; these cover parsing and
/// record lifecycle violations.
#[derive(Debug, thiserror::Error)]
pub enum UnlockError {
    /// Purchase status change not allowed by the lifecycle.
    #[error("invalid status transition from {from:?} to {to:?}")]
    InvalidStatusTransition {
        /// The current status.
        from: PurchaseStatus,
        /// The requested status.
        to: PurchaseStatus,
    },

    /// Unknown tier name.
    #[error("invalid tier: {0}")]
    InvalidTier(String),

    /// Unknown status name.
    #[error("invalid status: {0}")]
    InvalidStatus(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}
