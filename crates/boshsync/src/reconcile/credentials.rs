//! Resolves which Director and which credentials apply to a record.

use log::error;

use super::artifact::DirectorScope;
use crate::error::{ReconcileError, Result};
use crate::remote::{DirectorEndpoint, IdentityEndpoint};
use crate::resource::{DirectorRecord, Record, TeamRecord};
use crate::secrets::SecretStore;
use crate::store::{get_record, list_records, RecordLookup, StoreError};

/// Looks up team bindings, Director records and their secrets.
pub struct CredentialResolver<'a> {
    lookup: &'a dyn RecordLookup,
    secrets: &'a dyn SecretStore,
    system_namespace: &'a str,
}

impl<'a> CredentialResolver<'a> {
    pub fn new(
        lookup: &'a dyn RecordLookup,
        secrets: &'a dyn SecretStore,
        system_namespace: &'a str,
    ) -> Self {
        Self {
            lookup,
            secrets,
            system_namespace,
        }
    }

    /// Returns the single team bound to `namespace`.
    pub async fn team_for_namespace(&self, namespace: &str) -> Result<TeamRecord> {
        let mut teams: Vec<TeamRecord> = list_records(self.lookup, namespace).await?;
        match teams.len() {
            0 => {
                error!("No team assigned to namespace '{}'", namespace);
                Err(ReconcileError::Configuration(format!(
                    "No team assigned to namespace '{}'",
                    namespace
                )))
            }
            1 => Ok(teams.remove(0)),
            n => {
                error!("Found {} teams in namespace '{}'", n, namespace);
                Err(ReconcileError::Configuration(format!(
                    "Found {} teams in namespace '{}'",
                    n, namespace
                )))
            }
        }
    }

    /// Fetches a Director record from the system namespace.
    pub async fn director(&self, name: &str) -> Result<DirectorRecord> {
        match get_record::<DirectorRecord>(self.lookup, self.system_namespace, name).await {
            Ok(director) => Ok(director),
            Err(StoreError::NotFound(_)) => Err(ReconcileError::Configuration(format!(
                "Director '{}' not found in namespace '{}'",
                name, self.system_namespace
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// The Identity Service endpoint authenticated as the Director's admin client.
    pub async fn identity_admin_endpoint(&self, director_name: &str) -> Result<IdentityEndpoint> {
        let director = self.director(director_name).await?;
        self.admin_identity(&director).await
    }

    async fn admin_identity(&self, director: &DirectorRecord) -> Result<IdentityEndpoint> {
        let secret = self
            .secrets
            .get(self.system_namespace, &director.spec.uaa_client_secret)
            .await?;
        Ok(IdentityEndpoint {
            url: director.spec.uaa_url.clone(),
            ca_cert: director.spec.uaa_ca_cert.clone(),
            client_id: director.spec.uaa_client.clone(),
            client_secret: secret,
        })
    }

    /// The Director endpoint, and the identity to call it with, for a scope.
    pub async fn director_endpoint(&self, scope: &DirectorScope) -> Result<DirectorEndpoint> {
        let (director, auth) = match scope {
            DirectorScope::Admin(name) => {
                let director = self.director(name).await?;
                let auth = self.admin_identity(&director).await?;
                (director, auth)
            }
            DirectorScope::Namespace(namespace) => {
                let team = self.team_for_namespace(namespace).await?;
                let director_name = team
                    .original_director()
                    .ok_or_else(|| ReconcileError::Unfrozen(team.key()))?;
                let director = self.director(director_name).await?;
                let secret = self
                    .secrets
                    .get(team.secret_namespace(), &team.secret_name())
                    .await?;
                let auth = IdentityEndpoint {
                    url: director.spec.uaa_url.clone(),
                    ca_cert: director.spec.uaa_ca_cert.clone(),
                    client_id: team.client_name(),
                    client_secret: secret,
                };
                (director, auth)
            }
        };

        Ok(DirectorEndpoint {
            url: director.spec.url.clone(),
            ca_cert: director.spec.ca_cert.clone(),
            auth,
        })
    }
}
