//! In-memory environment for driving the reconciler end to end.

#![allow(dead_code)]

use std::sync::Arc;

use secrecy::SecretString;

use boshsync::error::Result;
use boshsync::remote::{RecordingDirector, RecordingFactory, RecordingIdentity};
use boshsync::resource::{Record, RecordKey};
use boshsync::secrets::{MemorySecretStore, SecretStore};
use boshsync::store::{into_typed, MemoryStore, RecordLookup, RecordStore};
use boshsync::Reconciler;

use super::builders::{
    director, team, ADMIN_SECRET, ADMIN_SECRET_NAME, DIRECTOR, SYSTEM_NS, TEAM_NS,
};

/// A store, a secret store and recording remote clients wired to one reconciler.
pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub secrets: Arc<MemorySecretStore>,
    pub factory: Arc<RecordingFactory>,
    pub reconciler: Arc<Reconciler>,
}

impl TestHarness {
    /// An empty environment.
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let secrets = Arc::new(MemorySecretStore::new());
        let factory = Arc::new(RecordingFactory::new());
        let reconciler = Arc::new(Reconciler::new(
            store.clone(),
            secrets.clone(),
            factory.clone(),
            SYSTEM_NS,
        ));
        Self {
            store,
            secrets,
            factory,
            reconciler,
        }
    }

    /// A Director record, its admin secret and a reconciled team bound to [`TEAM_NS`].
    ///
    /// Recorded remote calls are cleared before returning.
    pub async fn bootstrapped() -> Self {
        let harness = Self::new();
        harness
            .seed_secret(SYSTEM_NS, ADMIN_SECRET_NAME, ADMIN_SECRET)
            .await;
        harness.create(director(DIRECTOR)).await;
        let team_key = harness.create(team(TEAM_NS, "team", DIRECTOR)).await;
        harness
            .reconcile(&team_key)
            .await
            .expect("team should reconcile");
        harness.director().clear_calls();
        harness.identity().clear_calls();
        harness
    }

    pub async fn seed_secret(&self, namespace: &str, name: &str, value: &str) {
        self.secrets
            .create(namespace, name, SecretString::from(value.to_string()))
            .await
            .expect("secret should be created");
    }

    /// Stores a new record and returns its key.
    pub async fn create<T: Record>(&self, record: T) -> RecordKey {
        let key = record.key();
        self.store
            .create(record.into_any())
            .await
            .expect("record should be created");
        key
    }

    pub async fn reconcile(&self, key: &RecordKey) -> Result<()> {
        self.reconciler.reconcile(key).await
    }

    /// Reads a record, panicking if it is missing.
    pub async fn get<T: Record>(&self, key: &RecordKey) -> T {
        let record = self.store.get(key).await.expect("record should exist");
        into_typed(key.clone(), record).expect("record should have the expected kind")
    }

    pub async fn exists(&self, key: &RecordKey) -> bool {
        self.store.get(key).await.is_ok()
    }

    /// Applies `edit` to the stored record's spec or metadata, as a user would.
    pub async fn edit<T: Record>(&self, key: &RecordKey, edit: impl FnOnce(&mut T)) -> T {
        let mut record: T = self.get(key).await;
        edit(&mut record);
        let stored = self
            .store
            .update(record.into_any())
            .await
            .expect("record should update");
        into_typed(key.clone(), stored).expect("record should have the expected kind")
    }

    /// Requests deletion, as a user would.
    pub async fn delete(&self, key: &RecordKey) {
        self.store.delete(key).await.expect("record should delete");
    }

    pub fn director(&self) -> Arc<RecordingDirector> {
        self.factory.director_client()
    }

    pub fn identity(&self) -> Arc<RecordingIdentity> {
        self.factory.identity_client()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
