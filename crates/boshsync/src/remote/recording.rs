//! In-memory Director and Identity Service.
//!
//! Both keep just enough remote state to answer existence checks, and log
//! every call so callers can assert on exactly what was sent.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::error::{RemoteError, Result};
use super::payload::{CloudConfig, DeploymentManifest};
use super::{ClientFactory, DirectorClient, DirectorEndpoint, IdentityClient, IdentityEndpoint};

/// A call made against a [`RecordingDirector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectorCall {
    HasRelease { name: String, version: String },
    UploadRelease { url: String, sha1: String },
    DeleteRelease { name: String, version: String },
    HasStemcell { name: String, version: String },
    UploadStemcell { url: String, sha1: String },
    DeleteStemcell { name: String, version: String },
    UpdateCloudConfig { name: String },
    DeleteCloudConfig { name: String },
    Deploy { name: String },
    DeleteDeployment { name: String },
}

impl DirectorCall {
    /// Returns true for calls that change remote state.
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            DirectorCall::HasRelease { .. } | DirectorCall::HasStemcell { .. }
        )
    }
}

type Artifact = (String, String);

#[derive(Debug, Default)]
struct DirectorState {
    release_sources: BTreeMap<String, Artifact>,
    stemcell_sources: BTreeMap<String, Artifact>,
    releases: BTreeSet<Artifact>,
    stemcells: BTreeSet<Artifact>,
    configs: BTreeMap<String, CloudConfig>,
    deployments: BTreeMap<String, DeploymentManifest>,
    calls: Vec<DirectorCall>,
    failure: Option<String>,
}

/// A Director that lives in memory.
#[derive(Debug, Default)]
pub struct RecordingDirector {
    state: Mutex<DirectorState>,
}

impl RecordingDirector {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, DirectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: DirectorCall) -> Result<MutexGuard<'_, DirectorState>> {
        let mut state = self.state();
        state.calls.push(call);
        match &state.failure {
            Some(message) => Err(RemoteError::Rejected(message.clone())),
            None => Ok(state),
        }
    }

    /// Declares which release an upload URL yields.
    pub fn register_release(&self, url: &str, name: &str, version: &str) {
        self.state()
            .release_sources
            .insert(url.to_string(), (name.to_string(), version.to_string()));
    }

    /// Declares which stemcell an upload URL yields.
    pub fn register_stemcell(&self, url: &str, name: &str, version: &str) {
        self.state()
            .stemcell_sources
            .insert(url.to_string(), (name.to_string(), version.to_string()));
    }

    /// Makes every following call fail with `message`.
    pub fn fail_with(&self, message: &str) {
        self.state().failure = Some(message.to_string());
    }

    /// Stops failing calls.
    pub fn recover(&self) {
        self.state().failure = None;
    }

    pub fn calls(&self) -> Vec<DirectorCall> {
        self.state().calls.clone()
    }

    /// Calls that changed remote state.
    pub fn mutations(&self) -> Vec<DirectorCall> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.is_mutation())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn cloud_config(&self, name: &str) -> Option<CloudConfig> {
        self.state().configs.get(name).cloned()
    }

    pub fn cloud_config_names(&self) -> Vec<String> {
        self.state().configs.keys().cloned().collect()
    }

    pub fn deployment(&self, name: &str) -> Option<DeploymentManifest> {
        self.state().deployments.get(name).cloned()
    }

    pub fn releases(&self) -> Vec<(String, String)> {
        self.state().releases.iter().cloned().collect()
    }

    pub fn stemcells(&self) -> Vec<(String, String)> {
        self.state().stemcells.iter().cloned().collect()
    }
}

#[async_trait]
impl DirectorClient for RecordingDirector {
    async fn has_release(&self, name: &str, version: &str) -> Result<bool> {
        let state = self.record(DirectorCall::HasRelease {
            name: name.to_string(),
            version: version.to_string(),
        })?;
        Ok(state
            .releases
            .contains(&(name.to_string(), version.to_string())))
    }

    async fn upload_release(&self, url: &str, sha1: &str) -> Result<()> {
        let mut state = self.record(DirectorCall::UploadRelease {
            url: url.to_string(),
            sha1: sha1.to_string(),
        })?;
        let artifact = state
            .release_sources
            .get(url)
            .cloned()
            .ok_or_else(|| RemoteError::Rejected(format!("cannot fetch release from '{}'", url)))?;
        state.releases.insert(artifact);
        Ok(())
    }

    async fn delete_release(&self, name: &str, version: &str) -> Result<()> {
        let mut state = self.record(DirectorCall::DeleteRelease {
            name: name.to_string(),
            version: version.to_string(),
        })?;
        state
            .releases
            .remove(&(name.to_string(), version.to_string()));
        Ok(())
    }

    async fn has_stemcell(&self, name: &str, version: &str) -> Result<bool> {
        let state = self.record(DirectorCall::HasStemcell {
            name: name.to_string(),
            version: version.to_string(),
        })?;
        Ok(state
            .stemcells
            .contains(&(name.to_string(), version.to_string())))
    }

    async fn upload_stemcell(&self, url: &str, sha1: &str) -> Result<()> {
        let mut state = self.record(DirectorCall::UploadStemcell {
            url: url.to_string(),
            sha1: sha1.to_string(),
        })?;
        let artifact = state
            .stemcell_sources
            .get(url)
            .cloned()
            .ok_or_else(|| RemoteError::Rejected(format!("cannot fetch stemcell from '{}'", url)))?;
        state.stemcells.insert(artifact);
        Ok(())
    }

    async fn delete_stemcell(&self, name: &str, version: &str) -> Result<()> {
        let mut state = self.record(DirectorCall::DeleteStemcell {
            name: name.to_string(),
            version: version.to_string(),
        })?;
        state
            .stemcells
            .remove(&(name.to_string(), version.to_string()));
        Ok(())
    }

    async fn update_cloud_config(&self, name: &str, config: &CloudConfig) -> Result<()> {
        let mut state = self.record(DirectorCall::UpdateCloudConfig {
            name: name.to_string(),
        })?;
        state.configs.insert(name.to_string(), config.clone());
        Ok(())
    }

    async fn delete_cloud_config(&self, name: &str) -> Result<()> {
        let mut state = self.record(DirectorCall::DeleteCloudConfig {
            name: name.to_string(),
        })?;
        state.configs.remove(name);
        Ok(())
    }

    async fn create_or_update_deployment(
        &self,
        name: &str,
        manifest: &DeploymentManifest,
    ) -> Result<()> {
        let mut state = self.record(DirectorCall::Deploy {
            name: name.to_string(),
        })?;
        state.deployments.insert(name.to_string(), manifest.clone());
        Ok(())
    }

    async fn delete_deployment(&self, name: &str) -> Result<()> {
        let mut state = self.record(DirectorCall::DeleteDeployment {
            name: name.to_string(),
        })?;
        state.deployments.remove(name);
        Ok(())
    }
}

/// A call made against a [`RecordingIdentity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityCall {
    HasClient { client_id: String },
    CreateClient { client_id: String },
    DeleteClient { client_id: String },
}

#[derive(Debug, Clone)]
struct StoredClient {
    secret: String,
    authorities: Vec<String>,
}

#[derive(Debug, Default)]
struct IdentityState {
    clients: BTreeMap<String, StoredClient>,
    calls: Vec<IdentityCall>,
    failure: Option<String>,
}

/// An Identity Service that lives in memory.
#[derive(Debug, Default)]
pub struct RecordingIdentity {
    state: Mutex<IdentityState>,
}

impl RecordingIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, IdentityState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: IdentityCall) -> Result<MutexGuard<'_, IdentityState>> {
        let mut state = self.state();
        state.calls.push(call);
        match &state.failure {
            Some(message) => Err(RemoteError::Rejected(message.clone())),
            None => Ok(state),
        }
    }

    pub fn fail_with(&self, message: &str) {
        self.state().failure = Some(message.to_string());
    }

    pub fn recover(&self) {
        self.state().failure = None;
    }

    pub fn calls(&self) -> Vec<IdentityCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn client_ids(&self) -> Vec<String> {
        self.state().clients.keys().cloned().collect()
    }

    /// Returns the secret a client was created with.
    pub fn client_secret(&self, client_id: &str) -> Option<String> {
        self.state().clients.get(client_id).map(|c| c.secret.clone())
    }

    pub fn client_authorities(&self, client_id: &str) -> Option<Vec<String>> {
        self.state()
            .clients
            .get(client_id)
            .map(|c| c.authorities.clone())
    }
}

#[async_trait]
impl IdentityClient for RecordingIdentity {
    async fn has_client(&self, client_id: &str) -> Result<bool> {
        let state = self.record(IdentityCall::HasClient {
            client_id: client_id.to_string(),
        })?;
        Ok(state.clients.contains_key(client_id))
    }

    async fn create_client(
        &self,
        client_id: &str,
        secret: &SecretString,
        authorities: &[&str],
    ) -> Result<()> {
        let mut state = self.record(IdentityCall::CreateClient {
            client_id: client_id.to_string(),
        })?;
        state.clients.insert(
            client_id.to_string(),
            StoredClient {
                secret: secret.expose_secret().to_string(),
                authorities: authorities.iter().map(|a| a.to_string()).collect(),
            },
        );
        Ok(())
    }

    async fn delete_client(&self, client_id: &str) -> Result<()> {
        let mut state = self.record(IdentityCall::DeleteClient {
            client_id: client_id.to_string(),
        })?;
        state.clients.remove(client_id);
        Ok(())
    }
}

/// An endpoint a [`RecordingFactory`] was asked to build a client for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointUse {
    pub url: String,
    pub client_id: String,
    pub client_secret: String,
}

/// Hands out the same in-memory clients for every endpoint and logs the endpoints asked for.
#[derive(Debug, Default)]
pub struct RecordingFactory {
    director: Arc<RecordingDirector>,
    identity: Arc<RecordingIdentity>,
    director_endpoints: Mutex<Vec<EndpointUse>>,
    identity_endpoints: Mutex<Vec<EndpointUse>>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn director_client(&self) -> Arc<RecordingDirector> {
        Arc::clone(&self.director)
    }

    pub fn identity_client(&self) -> Arc<RecordingIdentity> {
        Arc::clone(&self.identity)
    }

    pub fn director_endpoints(&self) -> Vec<EndpointUse> {
        self.director_endpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn identity_endpoints(&self) -> Vec<EndpointUse> {
        self.identity_endpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ClientFactory for RecordingFactory {
    fn director(&self, endpoint: &DirectorEndpoint) -> Result<Arc<dyn DirectorClient>> {
        self.director_endpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(EndpointUse {
                url: endpoint.url.clone(),
                client_id: endpoint.auth.client_id.clone(),
                client_secret: endpoint.auth.client_secret.expose_secret().to_string(),
            });
        Ok(self.director.clone())
    }

    fn identity(&self, endpoint: &IdentityEndpoint) -> Result<Arc<dyn IdentityClient>> {
        self.identity_endpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(EndpointUse {
                url: endpoint.url.clone(),
                client_id: endpoint.client_id.clone(),
                client_secret: endpoint.client_secret.expose_secret().to_string(),
            });
        Ok(self.identity.clone())
    }
}
