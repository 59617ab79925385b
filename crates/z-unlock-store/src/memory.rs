//! In-memory storage implementation.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use z_unlock_core::{
    ConsumptionRecord, Credits, GenerationId, PurchaseId, PurchaseRecord, PurchaseStatus, UserId,
};

use crate::error::{Result, StoreError};
use crate::{apply_transition, page, spend_credit, Consumed, PurchaseFilter, Store};

#[derive(Default)]
struct Tables {
    purchases: HashMap<PurchaseId, PurchaseRecord>,
    purchases_by_session: HashMap<String, PurchaseId>,
    generations: HashMap<GenerationId, ConsumptionRecord>,
}

/// Process-local storage behind a single mutex.
///
/// Every operation takes the lock for its whole read-modify-write, which
/// makes each one atomic with respect to the others.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }
}

impl Store for MemoryStore {
    fn put_purchase(&self, record: &PurchaseRecord) -> Result<()> {
        let mut tables = self.lock()?;
        if let Some(session_id) = &record.checkout_session_id {
            tables
                .purchases_by_session
                .insert(session_id.clone(), record.id);
        }
        tables.purchases.insert(record.id, record.clone());
        Ok(())
    }

    fn get_purchase(&self, purchase_id: &PurchaseId) -> Result<Option<PurchaseRecord>> {
        Ok(self.lock()?.purchases.get(purchase_id).cloned())
    }

    fn find_purchase_by_session(&self, session_id: &str) -> Result<Option<PurchaseRecord>> {
        let tables = self.lock()?;
        Ok(tables
            .purchases_by_session
            .get(session_id)
            .and_then(|id| tables.purchases.get(id))
            .cloned())
    }

    fn list_purchases_by_user(
        &self,
        user_id: &UserId,
        filter: PurchaseFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PurchaseRecord>> {
        let tables = self.lock()?;
        let mut records: Vec<_> = tables
            .purchases
            .values()
            .filter(|r| r.user_id == *user_id)
            .cloned()
            .collect();
        // PurchaseIds are ULIDs, so descending id is newest first.
        records.sort_by(|a, b| b.id.cmp(&a.id));

        Ok(page(records.into_iter(), filter, limit, offset))
    }

    fn transition_purchase(
        &self,
        purchase_id: &PurchaseId,
        next: PurchaseStatus,
    ) -> Result<PurchaseRecord> {
        let mut tables = self.lock()?;
        let record = tables
            .purchases
            .get_mut(purchase_id)
            .ok_or_else(|| StoreError::purchase_not_found(purchase_id))?;

        apply_transition(record, next)?;
        Ok(record.clone())
    }

    fn set_checkout_session(
        &self,
        purchase_id: &PurchaseId,
        session_id: &str,
    ) -> Result<PurchaseRecord> {
        let mut tables = self.lock()?;
        let record = tables
            .purchases
            .get_mut(purchase_id)
            .ok_or_else(|| StoreError::purchase_not_found(purchase_id))?;

        record.checkout_session_id = Some(session_id.to_string());
        record.updated_at = Utc::now();
        let updated = record.clone();

        tables
            .purchases_by_session
            .insert(session_id.to_string(), *purchase_id);
        Ok(updated)
    }

    fn decrement_credits(&self, purchase_id: &PurchaseId) -> Result<Credits> {
        let mut tables = self.lock()?;
        let record = tables
            .purchases
            .get_mut(purchase_id)
            .ok_or_else(|| StoreError::credit_pack_not_found(purchase_id))?;

        spend_credit(record)
    }

    fn consume_generation(
        &self,
        generation_id: &GenerationId,
        user_id: &UserId,
        purchase_id: &PurchaseId,
    ) -> Result<Consumed> {
        let mut tables = self.lock()?;
        if let Some(existing) = tables.generations.get(generation_id) {
            return Ok(Consumed::Existing(existing.clone()));
        }

        let record = tables
            .purchases
            .get_mut(purchase_id)
            .ok_or_else(|| StoreError::credit_pack_not_found(purchase_id))?;
        let remaining = spend_credit(record)?;

        let entry =
            ConsumptionRecord::spent(generation_id.clone(), *user_id, *purchase_id, remaining);
        tables
            .generations
            .insert(generation_id.clone(), entry.clone());
        Ok(Consumed::Spent(entry))
    }

    fn get_generation(&self, generation_id: &GenerationId) -> Result<Option<ConsumptionRecord>> {
        Ok(self.lock()?.generations.get(generation_id).cloned())
    }
}
