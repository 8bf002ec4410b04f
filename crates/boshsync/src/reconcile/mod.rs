//! The reconciliation engine.
//!
//! One call to [`Reconciler::reconcile`] drives one record one step closer to
//! its desired state and returns. Every write happens before the remote call
//! that depends on it:
//!
//! - active: freeze spec → persist status → attach finalizer → persist →
//!   create remote object → persist status
//! - deleting: delete remote object → drop finalizer → persist
//!
//! so a failure at any point leaves a state the next call resumes from. The
//! engine never retries or sleeps; errors go back to the caller.

pub mod artifact;
pub mod credentials;
mod identity;
pub mod sweep;

use std::sync::Arc;

use log::{debug, info, warn};
use tracing::Instrument;

use crate::error::{ReconcileError, Result};
use crate::remote::{ClientFactory, DirectorClient, IdentityClient};
use crate::resource::{AnyRecord, DeploymentRecord, Record, RecordKey};
use crate::secrets::SecretStore;
use crate::store::{into_typed, RecordStore, StoreError};

pub use artifact::{DirectorArtifact, DirectorScope};
pub use credentials::CredentialResolver;
pub use sweep::{SweepReport, SweepScheduler, Sweeper};

/// Drives records against the Director and the Identity Service.
pub struct Reconciler {
    store: Arc<dyn RecordStore>,
    secrets: Arc<dyn SecretStore>,
    clients: Arc<dyn ClientFactory>,
    system_namespace: String,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn RecordStore>,
        secrets: Arc<dyn SecretStore>,
        clients: Arc<dyn ClientFactory>,
        system_namespace: impl Into<String>,
    ) -> Self {
        Self {
            store,
            secrets,
            clients,
            system_namespace: system_namespace.into(),
        }
    }

    pub fn system_namespace(&self) -> &str {
        &self.system_namespace
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Reconciles the record at `key` once.
    ///
    /// A record that no longer exists is already reconciled.
    pub async fn reconcile(&self, key: &RecordKey) -> Result<()> {
        let span = tracing::info_span!("reconcile", record = %key, kind = %key.kind);
        async {
            let record = match self.store.get(key).await {
                Ok(record) => record,
                Err(StoreError::NotFound(_)) => {
                    debug!("{} no longer exists", key);
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };

            let result = self.dispatch(record).await;
            if let Err(e) = &result {
                warn!("Reconcile of {} failed: {}", key, e);
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, record: AnyRecord) -> Result<()> {
        match record {
            AnyRecord::Director(r) => {
                self.require_system_namespace(&r)?;
                self.reconcile_director(r).await
            }
            AnyRecord::Team(r) => self.reconcile_team(r).await,
            AnyRecord::Compilation(r) => {
                self.require_system_namespace(&r)?;
                self.reconcile_artifact(r).await
            }
            AnyRecord::Deployment(r) => self.reconcile_deployment(r).await,
            AnyRecord::Az(r) => self.reconcile_artifact(r).await,
            AnyRecord::Network(r) => self.reconcile_artifact(r).await,
            AnyRecord::BaseImage(r) => self.reconcile_artifact(r).await,
            AnyRecord::Release(r) => self.reconcile_artifact(r).await,
            AnyRecord::VmExtension(r) => self.reconcile_artifact(r).await,
            AnyRecord::Role(r) => {
                debug!("{} is reference data only", r.key());
                Ok(())
            }
        }
    }

    fn require_system_namespace<T: Record>(&self, record: &T) -> Result<()> {
        if record.metadata().namespace != self.system_namespace {
            return Err(ReconcileError::Configuration(format!(
                "{} records are only allowed in namespace '{}', found '{}'",
                T::KIND,
                self.system_namespace,
                record.metadata().namespace
            )));
        }
        Ok(())
    }

    fn credentials(&self) -> CredentialResolver<'_> {
        CredentialResolver::new(
            self.store.as_lookup(),
            self.secrets.as_ref(),
            &self.system_namespace,
        )
    }

    async fn director_client(&self, scope: &DirectorScope) -> Result<Arc<dyn DirectorClient>> {
        let endpoint = self.credentials().director_endpoint(scope).await?;
        Ok(self.clients.director(&endpoint)?)
    }

    async fn identity_admin(&self, director: &str) -> Result<Arc<dyn IdentityClient>> {
        let endpoint = self.credentials().identity_admin_endpoint(director).await?;
        Ok(self.clients.identity(&endpoint)?)
    }

    /// Persists metadata and spec, returning the stored copy.
    async fn write<T: Record>(&self, record: T) -> Result<T> {
        let key = record.key();
        let stored = self.store.update(record.into_any()).await?;
        Ok(into_typed(key, stored)?)
    }

    /// Persists status, returning the stored copy.
    async fn write_status<T: Record>(&self, record: T) -> Result<T> {
        let key = record.key();
        let stored = self.store.update_status(record.into_any()).await?;
        Ok(into_typed(key, stored)?)
    }

    async fn reconcile_deployment(&self, mut record: DeploymentRecord) -> Result<()> {
        if record.consume_force_flag() {
            info!("Consuming force_reconciliation on {}", record.key());
            record = self.write(record).await?;
        }
        self.reconcile_artifact(record).await
    }

    /// The lifecycle shared by every Director-backed kind.
    pub async fn reconcile_artifact<T: DirectorArtifact>(&self, mut record: T) -> Result<()> {
        if record.being_deleted() {
            if !record.has_finalizer() {
                debug!("{} has no finalizer, nothing to clean up", record.key());
                return Ok(());
            }
            let director = self.director_client(&record.director_scope()).await?;
            record.delete_if_exists(director.as_ref()).await?;
            info!("Removed {} from the Director", record.key());
            if record.ensure_no_finalizer() {
                self.write(record).await?;
            }
            return Ok(());
        }

        let director = self.director_client(&record.director_scope()).await?;

        if record.prepare_to_save() {
            record = self.write_status(record).await?;
        }
        if record.ensure_finalizer() {
            record = self.write(record).await?;
        }

        let before = record.status().clone();
        record
            .create_unless_exists(director.as_ref(), self.store.as_lookup())
            .await?;
        if record.status() != &before {
            self.write_status(record).await?;
        }
        Ok(())
    }
}
