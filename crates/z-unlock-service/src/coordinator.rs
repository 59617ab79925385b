//! Consumption coordinator.
//!
//! Ties a generation to at most one credit decrement. A metered
//! consumption is a single store call that checks the generation journal,
//! spends the credit and writes the journal entry together:
//!
//! - an id already in the journal is replayed without spending;
//! - a failed decrement writes nothing, so a re-resolved retry can proceed;
//! - the call runs on the blocking pool and finishes even if the request
//!   is dropped, so a retry after a timeout finds the entry and replays.
//!
//! Unmetered sources never touch the store.

use std::sync::Arc;

use z_unlock_core::{
    AccessDecision, AccessSource, ConsumptionOutcome, ConsumptionRecord, GenerationId, PurchaseId,
    UserId,
};
use z_unlock_store::{Consumed, Store, StoreError};

use crate::ledger::{run_store, CreditLedger, LedgerError};

/// Errors from consumption.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsumptionError {
    /// The decision grants no access; there is nothing to consume.
    #[error("no entitlement")]
    NoEntitlement,

    /// The granting record vanished between resolution and consumption.
    #[error("entitlement changed: {purchase_id}")]
    NotFound {
        /// The record the decision pointed at.
        purchase_id: PurchaseId,
    },

    /// The pack hit zero between resolution and consumption.
    #[error("credit no longer available: {purchase_id}")]
    Exhausted {
        /// The empty pack.
        purchase_id: PurchaseId,
    },

    /// Store failure; safe to retry with the same generation id.
    #[error("consumption unavailable: {0}")]
    Transient(String),

    /// The generation id is journalled for a different user.
    #[error("generation id already used: {generation_id}")]
    GenerationConflict {
        /// The reused generation id.
        generation_id: GenerationId,
    },
}

impl ConsumptionError {
    /// Whether the caller may retry with the same generation id.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NoEntitlement => "payment_required",
            Self::NotFound { .. } => "entitlement_changed",
            Self::Exhausted { .. } => "credit_exhausted",
            Self::Transient(_) => "retryable",
            Self::GenerationConflict { .. } => "generation_conflict",
        }
    }
}

impl From<LedgerError> for ConsumptionError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound { purchase_id } => Self::NotFound { purchase_id },
            LedgerError::Exhausted { purchase_id } => Self::Exhausted { purchase_id },
            LedgerError::Transient(msg) => Self::Transient(msg),
        }
    }
}

impl From<StoreError> for ConsumptionError {
    fn from(err: StoreError) -> Self {
        Self::Transient(err.to_string())
    }
}

/// Result of consuming after the artifact already went out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// Consumption succeeded (or was not needed).
    Settled(ConsumptionOutcome),
    /// Consumption failed; the delivered artifact stands.
    Unsettled(ConsumptionError),
}

/// Applies access decisions to the credit ledger, once per generation.
#[derive(Clone)]
pub struct ConsumptionCoordinator {
    store: Arc<dyn Store>,
    ledger: CreditLedger,
}

impl ConsumptionCoordinator {
    /// Create a coordinator over a store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        let ledger = CreditLedger::new(Arc::clone(&store));
        Self { store, ledger }
    }

    /// Look up a journalled generation.
    ///
    /// Returns the entry if this user already consumed under
    /// `generation_id`, `None` if the id is unused.
    ///
    /// # Errors
    ///
    /// - [`ConsumptionError::GenerationConflict`] if another user owns the id.
    /// - [`ConsumptionError::Transient`] on store failure.
    pub async fn lookup(
        &self,
        user_id: UserId,
        generation_id: &GenerationId,
    ) -> Result<Option<ConsumptionRecord>, ConsumptionError> {
        let key = generation_id.clone();
        let existing = run_store(&self.store, move |store| store.get_generation(&key)).await?;

        existing
            .map(|record| Self::check_existing(user_id, record))
            .transpose()
    }

    /// Consume under `decision` for one generation.
    ///
    /// `pack_all` and `single` return [`ConsumptionOutcome::not_metered`]
    /// without touching the store. `pack_5_credit` spends exactly one credit
    /// per distinct generation id; a repeated id returns the journalled
    /// outcome with `replayed` set.
    ///
    /// # Errors
    ///
    /// - [`ConsumptionError::NoEntitlement`] for a no-access decision.
    /// - [`ConsumptionError::NotFound`] / [`ConsumptionError::Exhausted`]
    ///   when the pack changed since resolution; re-resolve before retrying.
    /// - [`ConsumptionError::Transient`] when retrying with the same
    ///   generation id is safe.
    /// - [`ConsumptionError::GenerationConflict`] if another user owns the id.
    pub async fn consume(
        &self,
        user_id: UserId,
        generation_id: &GenerationId,
        decision: &AccessDecision,
    ) -> Result<ConsumptionOutcome, ConsumptionError> {
        match decision.source {
            AccessSource::None => Err(ConsumptionError::NoEntitlement),
            AccessSource::PackAll | AccessSource::Single => Ok(ConsumptionOutcome::not_metered()),
            AccessSource::Pack5Credit => {
                let purchase_id = decision
                    .source_record_id
                    .ok_or(ConsumptionError::NoEntitlement)?;
                self.consume_credit(user_id, generation_id, purchase_id)
                    .await
            }
        }
    }

    /// Consume after the clean artifact was delivered.
    ///
    /// Failures are logged and returned as [`Settlement::Unsettled`]. The
    /// delivered artifact is never revoked or re-watermarked.
    pub async fn settle_after_delivery(
        &self,
        user_id: UserId,
        generation_id: &GenerationId,
        decision: &AccessDecision,
    ) -> Settlement {
        match self.consume(user_id, generation_id, decision).await {
            Ok(outcome) => Settlement::Settled(outcome),
            Err(e) => {
                tracing::error!(
                    user_id = %user_id,
                    generation_id = %generation_id,
                    source = %decision.source.as_str(),
                    source_record_id = ?decision.source_record_id,
                    error = %e,
                    "Consumption failed after delivery; leaving artifact as delivered"
                );
                Settlement::Unsettled(e)
            }
        }
    }

    async fn consume_credit(
        &self,
        user_id: UserId,
        generation_id: &GenerationId,
        purchase_id: PurchaseId,
    ) -> Result<ConsumptionOutcome, ConsumptionError> {
        match self
            .ledger
            .decrement_once(user_id, generation_id, purchase_id)
            .await
        {
            Ok(Consumed::Spent(entry)) => {
                tracing::info!(
                    user_id = %user_id,
                    generation_id = %generation_id,
                    purchase_id = %purchase_id,
                    remaining = %entry.remaining_credits,
                    "Credit consumed"
                );
                Ok(ConsumptionOutcome::spent(entry.remaining_credits))
            }
            Ok(Consumed::Existing(entry)) => {
                let entry = Self::check_existing(user_id, entry)?;
                tracing::debug!(
                    generation_id = %generation_id,
                    "Generation already consumed, replaying"
                );
                Ok(entry.replay())
            }
            Err(e) => {
                tracing::info!(
                    user_id = %user_id,
                    generation_id = %generation_id,
                    purchase_id = %purchase_id,
                    error = %e,
                    "Credit consumption rejected"
                );
                Err(e.into())
            }
        }
    }

    fn check_existing(
        user_id: UserId,
        record: ConsumptionRecord,
    ) -> Result<ConsumptionRecord, ConsumptionError> {
        if record.user_id != user_id {
            return Err(ConsumptionError::GenerationConflict {
                generation_id: record.generation_id,
            });
        }
        Ok(record)
    }
}
