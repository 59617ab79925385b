//! Storage layer for z-unlock.
//!
//! This crate owns the purchase-record store that entitlement checks read
//! from and the credit ledger writes to, plus the generation journal used to
//! make consumption idempotent.
//!
//! # Backends
//!
//! - [`MemoryStore`]: process-local, used by tests and single-node setups.
//! - `RocksStore` (feature `rocksdb-backend`): persistent, with column
//!   families for purchases, the per-user index, the checkout-session index
//!   and the generation journal.
//!
//! # Atomicity
//!
//! Every read-modify-write operation (`decrement_credits`,
//! `consume_generation`, `transition_purchase`, `set_checkout_session`) is
//! atomic with respect to the other calls on the same store. This is what prevents double-spending when
//! several sessions of one user consume at the same time.
//!
//! # Example
//!
//! ```
//! use z_unlock_core::{Credits, PurchaseRecord, UserId};
//! use z_unlock_store::{MemoryStore, Store};
//!
//! let store = MemoryStore::new();
//! let user_id = UserId::generate();
//! let pack = PurchaseRecord::pack_5_with(user_id, Credits::Finite(1));
//! store.put_purchase(&pack).unwrap();
//!
//! assert_eq!(store.decrement_credits(&pack.id).unwrap(), Credits::ZERO);
//! assert!(store.decrement_credits(&pack.id).is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod memory;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use z_unlock_core::{
    ConsumptionRecord, Credits, GenerationId, PurchaseId, PurchaseRecord, PurchaseStatus, Tier,
    UserId,
};

/// Optional filters for listing a user's purchases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurchaseFilter {
    /// Only records in this status.
    pub status: Option<PurchaseStatus>,
    /// Only records of this tier.
    pub tier: Option<Tier>,
}

impl PurchaseFilter {
    /// Filter matching completed records of any tier.
    #[must_use]
    pub const fn completed() -> Self {
        Self {
            status: Some(PurchaseStatus::Completed),
            tier: None,
        }
    }

    /// Whether a record passes this filter.
    #[must_use]
    pub fn matches(&self, record: &PurchaseRecord) -> bool {
        self.status.map_or(true, |s| s == record.status)
            && self.tier.map_or(true, |t| t == record.tier)
    }
}

/// Result of a journalled decrement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Consumed {
    /// This call spent the credit and wrote the entry.
    Spent(ConsumptionRecord),
    /// The generation id was already journalled; nothing was spent.
    Existing(ConsumptionRecord),
}

/// The storage trait defining all database operations.
///
/// Abstracts the storage layer so handlers and the consumption path work
/// against either backend.
pub trait Store: Send + Sync {
    // =========================================================================
    // Purchase Operations
    // =========================================================================

    /// Insert or replace a purchase record, maintaining the user and
    /// checkout-session indexes.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_purchase(&self, record: &PurchaseRecord) -> Result<()>;

    /// Get a purchase by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_purchase(&self, purchase_id: &PurchaseId) -> Result<Option<PurchaseRecord>>;

    /// Get the purchase created for a payment gateway checkout session.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_purchase_by_session(&self, session_id: &str) -> Result<Option<PurchaseRecord>>;

    /// List purchases for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_purchases_by_user(
        &self,
        user_id: &UserId,
        filter: PurchaseFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PurchaseRecord>>;

    /// All completed purchases of a user, newest first.
    ///
    /// This is the read side of every entitlement check.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn fetch_completed_purchases(&self, user_id: &UserId) -> Result<Vec<PurchaseRecord>> {
        self.list_purchases_by_user(user_id, PurchaseFilter::completed(), usize::MAX, 0)
    }

    /// Move a purchase to a new status atomically.
    ///
    /// Returns the updated record.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the purchase doesn't exist.
    /// - `StoreError::InvalidTransition` if the lifecycle forbids the move.
    fn transition_purchase(
        &self,
        purchase_id: &PurchaseId,
        next: PurchaseStatus,
    ) -> Result<PurchaseRecord>;

    /// Attach a checkout session id to a purchase.
    ///
    /// Only the session id, its index entry and `updated_at` are written;
    /// the status a concurrent webhook may have set is kept.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the purchase doesn't exist.
    fn set_checkout_session(
        &self,
        purchase_id: &PurchaseId,
        session_id: &str,
    ) -> Result<PurchaseRecord>;

    // =========================================================================
    // Credit Operations
    // =========================================================================

    /// Spend one credit from a completed `pack_5` record.
    ///
    /// Atomic compare-and-decrement: the balance is re-read under the
    /// store's write lock, so concurrent calls against a balance of 1 see
    /// exactly one success. Unlimited balances are returned unchanged.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if no completed `pack_5` record has this id.
    /// - `StoreError::Exhausted` if the balance is already zero.
    fn decrement_credits(&self, purchase_id: &PurchaseId) -> Result<Credits>;

    // =========================================================================
    // Generation Journal
    // =========================================================================

    /// Spend one credit for a generation and journal it in one step.
    ///
    /// If `generation_id` is already journalled the existing entry is
    /// returned and the balance is left alone. Otherwise the decrement and
    /// the journal entry are written together, so no entry exists without
    /// its decrement and no decrement without its entry.
    ///
    /// # Errors
    ///
    /// Same as [`Store::decrement_credits`]; nothing is written on error.
    fn consume_generation(
        &self,
        generation_id: &GenerationId,
        user_id: &UserId,
        purchase_id: &PurchaseId,
    ) -> Result<Consumed>;

    /// Get a journal entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_generation(&self, generation_id: &GenerationId) -> Result<Option<ConsumptionRecord>>;
}

/// Spend one credit from `record` in place.
///
/// Shared by the backends so both enforce the same ledger rules.
pub(crate) fn spend_credit(record: &mut PurchaseRecord) -> Result<Credits> {
    if !record.is_completed() || record.tier != Tier::Pack5 {
        return Err(StoreError::credit_pack_not_found(&record.id));
    }

    let balance = record.credits_remaining.unwrap_or(Credits::ZERO);
    let Some(next) = balance.spend_one() else {
        tracing::debug!(purchase_id = %record.id, "Credit pack exhausted");
        return Err(StoreError::Exhausted {
            purchase_id: record.id,
        });
    };

    if next != balance {
        record.credits_remaining = Some(next);
        record.updated_at = chrono::Utc::now();
    }
    Ok(next)
}

/// Apply a status transition, mapping lifecycle errors to `StoreError`.
pub(crate) fn apply_transition(record: &mut PurchaseRecord, next: PurchaseStatus) -> Result<()> {
    let from = record.status;
    record
        .transition(next)
        .map_err(|_| StoreError::InvalidTransition {
            purchase_id: record.id,
            from,
            to: next,
        })
}

/// Apply filter, offset and limit to records already sorted newest first.
pub(crate) fn page(
    records: impl Iterator<Item = PurchaseRecord>,
    filter: PurchaseFilter,
    limit: usize,
    offset: usize,
) -> Vec<PurchaseRecord> {
    records
        .filter(|r| filter.matches(r))
        .skip(offset)
        .take(limit)
        .collect()
}
