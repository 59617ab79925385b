//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use chrono::Utc;
use z_unlock_core::{
    ConsumptionRecord, Credits, GenerationId, PurchaseId, PurchaseRecord, PurchaseStatus, UserId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{apply_transition, page, spend_credit, Consumed, PurchaseFilter, Store};

/// RocksDB-backed storage implementation.
///
/// Read-modify-write operations hold `write_lock` for their whole duration;
/// plain reads go straight to the database.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let path = path.as_ref();
        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::info!(path = %path.display(), "Opened RocksDB store");

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| StoreError::Database("write lock poisoned".into()))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get_value<T: serde::de::DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn put_value<T: serde::Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let value = Self::serialize(value)?;
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Write a purchase and its index entries in one batch.
    fn write_purchase(&self, record: &PurchaseRecord) -> Result<()> {
        let cf_purchases = self.cf(cf::PURCHASES)?;
        let cf_by_user = self.cf(cf::PURCHASES_BY_USER)?;
        let cf_by_session = self.cf(cf::PURCHASES_BY_SESSION)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(
            &cf_purchases,
            keys::purchase_key(&record.id),
            Self::serialize(record)?,
        );
        batch.put_cf(
            &cf_by_user,
            keys::user_purchase_key(&record.user_id, &record.id),
            [],
        ); // Index entry (empty value)
        if let Some(session_id) = &record.checkout_session_id {
            batch.put_cf(
                &cf_by_session,
                keys::session_key(session_id),
                record.id.to_bytes(),
            );
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Purchase Operations
    // =========================================================================

    fn put_purchase(&self, record: &PurchaseRecord) -> Result<()> {
        let _guard = self.lock()?;
        self.write_purchase(record)
    }

    fn get_purchase(&self, purchase_id: &PurchaseId) -> Result<Option<PurchaseRecord>> {
        self.get_value(cf::PURCHASES, &keys::purchase_key(purchase_id))
    }

    fn find_purchase_by_session(&self, session_id: &str) -> Result<Option<PurchaseRecord>> {
        let cf = self.cf(cf::PURCHASES_BY_SESSION)?;
        let Some(raw) = self
            .db
            .get_cf(&cf, keys::session_key(session_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };

        let bytes: [u8; 16] = raw
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::Serialization("corrupt session index entry".into()))?;
        self.get_purchase(&PurchaseId::from_bytes(bytes))
    }

    fn list_purchases_by_user(
        &self,
        user_id: &UserId,
        filter: PurchaseFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PurchaseRecord>> {
        let cf_by_user = self.cf(cf::PURCHASES_BY_USER)?;
        let prefix = keys::user_purchases_prefix(user_id);

        let iter = self
            .db
            .iterator_cf(&cf_by_user, IteratorMode::From(&prefix, Direction::Forward));

        // Collect matching ids first (ULIDs iterate oldest first).
        let mut ids = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if !key.starts_with(&prefix) {
                break;
            }

            if let Some(id) = keys::purchase_id_from_user_key(&key) {
                ids.push(id);
            }
        }

        // Reverse to get newest first
        ids.reverse();

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.get_purchase(&id)? {
                records.push(record);
            }
        }

        Ok(page(records.into_iter(), filter, limit, offset))
    }

    fn transition_purchase(
        &self,
        purchase_id: &PurchaseId,
        next: PurchaseStatus,
    ) -> Result<PurchaseRecord> {
        let _guard = self.lock()?;
        let mut record = self
            .get_purchase(purchase_id)?
            .ok_or_else(|| StoreError::purchase_not_found(purchase_id))?;

        apply_transition(&mut record, next)?;
        self.write_purchase(&record)?;
        Ok(record)
    }

    fn set_checkout_session(
        &self,
        purchase_id: &PurchaseId,
        session_id: &str,
    ) -> Result<PurchaseRecord> {
        let _guard = self.lock()?;
        let mut record = self
            .get_purchase(purchase_id)?
            .ok_or_else(|| StoreError::purchase_not_found(purchase_id))?;

        record.checkout_session_id = Some(session_id.to_string());
        record.updated_at = Utc::now();
        self.write_purchase(&record)?;
        Ok(record)
    }

    // =========================================================================
    // Credit Operations
    // =========================================================================

    fn decrement_credits(&self, purchase_id: &PurchaseId) -> Result<Credits> {
        let _guard = self.lock()?;
        let mut record = self
            .get_purchase(purchase_id)?
            .ok_or_else(|| StoreError::credit_pack_not_found(purchase_id))?;

        let before = record.credits_remaining;
        let balance = spend_credit(&mut record)?;

        // Unlimited pools are never rewritten.
        if record.credits_remaining != before {
            self.put_value(cf::PURCHASES, &keys::purchase_key(purchase_id), &record)?;
        }

        Ok(balance)
    }

    // =========================================================================
    // Generation Journal
    // =========================================================================

    fn consume_generation(
        &self,
        generation_id: &GenerationId,
        user_id: &UserId,
        purchase_id: &PurchaseId,
    ) -> Result<Consumed> {
        let _guard = self.lock()?;
        let key = keys::generation_key(generation_id);

        if let Some(existing) = self.get_value(cf::GENERATIONS, &key)? {
            return Ok(Consumed::Existing(existing));
        }

        let mut record = self
            .get_purchase(purchase_id)?
            .ok_or_else(|| StoreError::credit_pack_not_found(purchase_id))?;
        let before = record.credits_remaining;
        let remaining = spend_credit(&mut record)?;
        let entry =
            ConsumptionRecord::spent(generation_id.clone(), *user_id, *purchase_id, remaining);

        // Balance and journal entry land in one batch.
        let mut batch = WriteBatch::default();
        if record.credits_remaining != before {
            batch.put_cf(
                &self.cf(cf::PURCHASES)?,
                keys::purchase_key(purchase_id),
                Self::serialize(&record)?,
            );
        }
        batch.put_cf(&self.cf(cf::GENERATIONS)?, key, Self::serialize(&entry)?);
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Consumed::Spent(entry))
    }

    fn get_generation(&self, generation_id: &GenerationId) -> Result<Option<ConsumptionRecord>> {
        self.get_value(cf::GENERATIONS, &keys::generation_key(generation_id))
    }
}
