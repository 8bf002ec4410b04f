//! Persisted record store interface.
//!
//! The reconciler only needs key lookups, scoped listing and three kinds of
//! write. Anything that can serialize writes per record can back it.

pub mod error;
pub mod memory;

use async_trait::async_trait;

use crate::resource::{AnyRecord, Record, RecordKey, ResourceKind};

pub use error::{ignore_already_exists, ignore_not_found, Result, StoreError};
pub use memory::MemoryStore;

/// Read-only access to records.
#[async_trait]
pub trait RecordLookup: Send + Sync {
    /// Fetches one record.
    async fn get(&self, key: &RecordKey) -> Result<AnyRecord>;

    /// Lists records of a kind, optionally restricted to one namespace.
    async fn list(&self, kind: ResourceKind, namespace: Option<&str>) -> Result<Vec<AnyRecord>>;
}

/// Read-write access to records.
#[async_trait]
pub trait RecordStore: RecordLookup {
    /// Inserts a new record. Fails with `AlreadyExists` on a key collision.
    async fn create(&self, record: AnyRecord) -> Result<AnyRecord>;

    /// Writes metadata and spec. The stored status is kept.
    async fn update(&self, record: AnyRecord) -> Result<AnyRecord>;

    /// Writes status only. Stored metadata and spec are kept.
    async fn update_status(&self, record: AnyRecord) -> Result<AnyRecord>;

    /// Requests deletion. Records holding finalizers are only marked.
    async fn delete(&self, key: &RecordKey) -> Result<()>;

    /// Returns this store as a read-only lookup.
    fn as_lookup(&self) -> &dyn RecordLookup;
}

/// Fetches a record and converts it to its typed form.
pub async fn get_record<T: Record>(
    lookup: &dyn RecordLookup,
    namespace: &str,
    name: &str,
) -> Result<T> {
    let key = RecordKey::new(T::KIND, namespace, name);
    let record = lookup.get(&key).await?;
    into_typed(key, record)
}

/// Lists the records of `T`'s kind in one namespace.
pub async fn list_records<T: Record>(lookup: &dyn RecordLookup, namespace: &str) -> Result<Vec<T>> {
    let records = lookup.list(T::KIND, Some(namespace)).await?;
    records
        .into_iter()
        .map(|record| into_typed(record.key(), record))
        .collect()
}

/// Converts a record returned by a store into `T`, reporting a kind mismatch otherwise.
pub fn into_typed<T: Record>(key: RecordKey, record: AnyRecord) -> Result<T> {
    let found = record.kind();
    T::from_any(record).ok_or(StoreError::KindMismatch {
        key,
        expected: T::KIND,
        found,
    })
}
