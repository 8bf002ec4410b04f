//! In-process record store.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use super::error::{Result, StoreError};
use super::{RecordLookup, RecordStore};
use crate::resource::{AnyRecord, RecordKey, ResourceKind};

/// Record store kept in memory.
///
/// Writes are checked against `resourceVersion` so a writer holding a stale
/// copy gets a `Conflict` instead of silently overwriting a newer one.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<RecordKey, AnyRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently stored, including those pending deletion.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns every stored key.
    pub fn keys(&self) -> Result<Vec<RecordKey>> {
        let records = self.records.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(records.keys().cloned().collect())
    }

    fn check_version(key: &RecordKey, stored: &AnyRecord, incoming: &AnyRecord) -> Result<()> {
        let expected = incoming.metadata().resource_version;
        let found = stored.metadata().resource_version;
        if expected != found {
            return Err(StoreError::Conflict {
                key: key.clone(),
                expected,
                found,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RecordLookup for MemoryStore {
    async fn get(&self, key: &RecordKey) -> Result<AnyRecord> {
        let records = self.records.read().map_err(|_| StoreError::LockPoisoned)?;
        records
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    async fn list(&self, kind: ResourceKind, namespace: Option<&str>) -> Result<Vec<AnyRecord>> {
        let records = self.records.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(records
            .iter()
            .filter(|(key, _)| key.kind == kind)
            .filter(|(key, _)| namespace.map_or(true, |ns| key.namespace == ns))
            .map(|(_, record)| record.clone())
            .collect())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create(&self, mut record: AnyRecord) -> Result<AnyRecord> {
        let key = record.key();
        let mut records = self.records.write().map_err(|_| StoreError::LockPoisoned)?;
        if records.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key));
        }

        let meta = record.metadata_mut();
        if meta.uid.is_empty() {
            meta.uid = uuid::Uuid::new_v4().to_string();
        }
        meta.resource_version = 1;
        meta.deletion_timestamp = None;

        records.insert(key, record.clone());
        Ok(record)
    }

    async fn update(&self, mut record: AnyRecord) -> Result<AnyRecord> {
        let key = record.key();
        let mut records = self.records.write().map_err(|_| StoreError::LockPoisoned)?;
        let stored = records
            .get(&key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        Self::check_version(&key, stored, &record)?;

        record.copy_status_from(stored);
        let stored_meta = stored.metadata().clone();
        let meta = record.metadata_mut();
        meta.uid = stored_meta.uid;
        meta.deletion_timestamp = stored_meta.deletion_timestamp;
        meta.resource_version = stored_meta.resource_version + 1;

        if record.metadata().being_deleted() && record.metadata().finalizers.is_empty() {
            log::debug!("Removing {} after its last finalizer was dropped", key);
            records.remove(&key);
            return Ok(record);
        }

        records.insert(key, record.clone());
        Ok(record)
    }

    async fn update_status(&self, record: AnyRecord) -> Result<AnyRecord> {
        let key = record.key();
        let mut records = self.records.write().map_err(|_| StoreError::LockPoisoned)?;
        let stored = records
            .get(&key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        Self::check_version(&key, stored, &record)?;

        let mut updated = stored.clone();
        if !updated.copy_status_from(&record) {
            return Err(StoreError::KindMismatch {
                key,
                expected: stored.kind(),
                found: record.kind(),
            });
        }
        updated.metadata_mut().resource_version += 1;

        records.insert(key, updated.clone());
        Ok(updated)
    }

    async fn delete(&self, key: &RecordKey) -> Result<()> {
        let mut records = self.records.write().map_err(|_| StoreError::LockPoisoned)?;
        let stored = records
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;

        if stored.metadata().finalizers.is_empty() {
            records.remove(key);
            return Ok(());
        }

        let meta = stored.metadata_mut();
        if meta.deletion_timestamp.is_none() {
            meta.deletion_timestamp = Some(Utc::now());
            meta.resource_version += 1;
        }
        Ok(())
    }

    fn as_lookup(&self) -> &dyn RecordLookup {
        self
    }
}
