//! Credit ledger: the only writer of pack balances.

use std::sync::Arc;

use z_unlock_core::{Credits, GenerationId, PurchaseId, UserId};
use z_unlock_store::{Consumed, Store, StoreError};

/// Errors from a ledger decrement.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// No completed `pack_5` record with this id.
    #[error("credit pack not found: {purchase_id}")]
    NotFound {
        /// The pack that was looked up.
        purchase_id: PurchaseId,
    },

    /// The pack balance is already zero.
    #[error("credits exhausted: {purchase_id}")]
    Exhausted {
        /// The empty pack.
        purchase_id: PurchaseId,
    },

    /// The store failed; the same call may succeed later.
    #[error("ledger unavailable: {0}")]
    Transient(String),
}

/// Run a store call on the blocking pool.
///
/// The spawned work keeps running if the awaiting future is dropped, so
/// whatever `f` does either happens in full or (if it fails) not at all,
/// regardless of what happens to the caller.
pub(crate) async fn run_store<T, F>(store: &Arc<dyn Store>, f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&dyn Store) -> Result<T, StoreError> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| StoreError::Database(format!("store task failed: {e}")))?
}

/// Spends credits from `pack_5` records.
#[derive(Clone)]
pub struct CreditLedger {
    store: Arc<dyn Store>,
}

impl CreditLedger {
    /// Create a ledger over a store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Spend one credit from a pack.
    ///
    /// Unlimited packs succeed without a write and return
    /// [`Credits::Unlimited`]. Finite packs return the new balance.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] if no completed `pack_5` record has this id.
    /// - [`LedgerError::Exhausted`] if the balance is zero; nothing changes.
    /// - [`LedgerError::Transient`] if the store failed.
    pub async fn decrement(&self, purchase_id: PurchaseId) -> Result<Credits, LedgerError> {
        let result = run_store(&self.store, move |store| store.decrement_credits(&purchase_id)).await;

        match result {
            Ok(remaining) => {
                tracing::debug!(purchase_id = %purchase_id, remaining = %remaining, "Credit spent");
                Ok(remaining)
            }
            Err(e) => {
                let err = LedgerError::from_store(purchase_id, e);
                tracing::debug!(purchase_id = %purchase_id, error = %err, "Credit decrement rejected");
                Err(err)
            }
        }
    }

    /// Spend one credit for `generation_id` unless it was already spent.
    ///
    /// The journal check, the decrement and the journal write run as one
    /// store call on the blocking pool. Dropping the returned future cannot
    /// leave a decrement without its journal entry.
    ///
    /// # Errors
    ///
    /// Same as [`CreditLedger::decrement`]. A repeated id is not an error.
    pub async fn decrement_once(
        &self,
        user_id: UserId,
        generation_id: &GenerationId,
        purchase_id: PurchaseId,
    ) -> Result<Consumed, LedgerError> {
        let key = generation_id.clone();
        let result = run_store(&self.store, move |store| {
            store.consume_generation(&key, &user_id, &purchase_id)
        })
        .await;

        match result {
            Ok(consumed) => {
                if let Consumed::Spent(entry) = &consumed {
                    tracing::debug!(
                        purchase_id = %purchase_id,
                        generation_id = %generation_id,
                        remaining = %entry.remaining_credits,
                        "Credit spent"
                    );
                }
                Ok(consumed)
            }
            Err(e) => {
                let err = LedgerError::from_store(purchase_id, e);
                tracing::debug!(
                    purchase_id = %purchase_id,
                    generation_id = %generation_id,
                    error = %err,
                    "Credit decrement rejected"
                );
                Err(err)
            }
        }
    }
}

impl LedgerError {
    fn from_store(purchase_id: PurchaseId, err: StoreError) -> Self {
        match err {
            StoreError::Exhausted { purchase_id } => Self::Exhausted { purchase_id },
            // A record in the wrong lifecycle state is as good as gone.
            StoreError::NotFound { .. } | StoreError::InvalidTransition { .. } => {
                Self::NotFound { purchase_id }
            }
            StoreError::Database(msg) | StoreError::Serialization(msg) => Self::Transient(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use z_unlock_core::{PurchaseRecord, Tier, UserId};
    use z_unlock_store::MemoryStore;

    fn ledger_with(record: &PurchaseRecord) -> (CreditLedger, Arc<dyn Store>) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        store.put_purchase(record).unwrap();
        (CreditLedger::new(Arc::clone(&store)), store)
    }

    #[tokio::test]
    async fn decrement_finite_pack() {
        let pack = PurchaseRecord::pack_5_with(UserId::generate(), Credits::Finite(3));
        let (ledger, store) = ledger_with(&pack);

        assert_eq!(ledger.decrement(pack.id).await, Ok(Credits::Finite(2)));
        assert_eq!(
            store.get_purchase(&pack.id).unwrap().unwrap().credits_remaining,
            Some(Credits::Finite(2))
        );
    }

    #[tokio::test]
    async fn decrement_empty_pack_is_exhausted() {
        let pack = PurchaseRecord::pack_5_with(UserId::generate(), Credits::ZERO);
        let (ledger, store) = ledger_with(&pack);

        assert_eq!(
            ledger.decrement(pack.id).await,
            Err(LedgerError::Exhausted {
                purchase_id: pack.id
            })
        );
        assert_eq!(store.get_purchase(&pack.id).unwrap().unwrap(), pack);
    }

    #[tokio::test]
    async fn unlimited_is_never_decremented() {
        let pack = PurchaseRecord::pack_5_with(UserId::generate(), Credits::Unlimited);
        let (ledger, store) = ledger_with(&pack);

        for _ in 0..20 {
            assert_eq!(ledger.decrement(pack.id).await, Ok(Credits::Unlimited));
        }
        assert_eq!(store.get_purchase(&pack.id).unwrap().unwrap(), pack);
    }

    #[tokio::test]
    async fn missing_or_unmetered_record_is_not_found() {
        let single = PurchaseRecord::completed(UserId::generate(), Tier::Single);
        let (ledger, _store) = ledger_with(&single);

        for id in [single.id, PurchaseId::generate()] {
            assert_eq!(
                ledger.decrement(id).await,
                Err(LedgerError::NotFound { purchase_id: id })
            );
        }
    }

    #[tokio::test]
    async fn decrement_once_spends_per_generation() {
        let user_id = UserId::generate();
        let pack = PurchaseRecord::pack_5_with(user_id, Credits::Finite(2));
        let (ledger, store) = ledger_with(&pack);
        let generation_id: GenerationId = "gen-1".parse().unwrap();

        let first = ledger
            .decrement_once(user_id, &generation_id, pack.id)
            .await
            .unwrap();
        let again = ledger
            .decrement_once(user_id, &generation_id, pack.id)
            .await
            .unwrap();

        let Consumed::Spent(entry) = first else {
            panic!("expected a spend, got {first:?}");
        };
        assert_eq!(again, Consumed::Existing(entry));
        assert_eq!(
            store.get_purchase(&pack.id).unwrap().unwrap().credits_remaining,
            Some(Credits::Finite(1))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_decrements_on_last_credit() {
        let pack = PurchaseRecord::pack_5_with(UserId::generate(), Credits::Finite(1));
        let (ledger, store) = ledger_with(&pack);

        let (a, b) = tokio::join!(ledger.decrement(pack.id), ledger.decrement(pack.id));
        let results = [a, b];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.contains(&Err(LedgerError::Exhausted {
            purchase_id: pack.id
        })));
        assert_eq!(
            store.get_purchase(&pack.id).unwrap().unwrap().credits_remaining,
            Some(Credits::ZERO)
        );
    }
}
