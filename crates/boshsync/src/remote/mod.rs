//! Clients for the Director and the Identity Service.
//!
//! Every operation must be safe to repeat: creating something that exists or
//! deleting something that is gone succeeds without side effects.

pub mod director;
pub mod error;
pub mod identity;
pub mod payload;
pub mod recording;
pub mod token;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use secrecy::{ExposeSecret, SecretString};

pub use director::HttpDirectorClient;
pub use error::{RemoteError, Result};
pub use identity::HttpIdentityClient;
pub use payload::{CloudConfig, DeploymentManifest};
pub use recording::{
    DirectorCall, EndpointUse, IdentityCall, RecordingDirector, RecordingFactory,
    RecordingIdentity,
};

/// Authority granted to every team client so it can manage its own releases and stemcells.
pub const TEAM_AUTHORITIES: &[&str] = &["bosh.admin"];

/// Operations against the Director.
#[async_trait]
pub trait DirectorClient: Send + Sync {
    async fn has_release(&self, name: &str, version: &str) -> Result<bool>;
    async fn upload_release(&self, url: &str, sha1: &str) -> Result<()>;
    async fn delete_release(&self, name: &str, version: &str) -> Result<()>;

    async fn has_stemcell(&self, name: &str, version: &str) -> Result<bool>;
    async fn upload_stemcell(&self, url: &str, sha1: &str) -> Result<()>;
    async fn delete_stemcell(&self, name: &str, version: &str) -> Result<()>;

    /// Creates or replaces the cloud-config fragment stored under `name`.
    async fn update_cloud_config(&self, name: &str, config: &CloudConfig) -> Result<()>;
    /// Removes the cloud-config fragment stored under `name`, if any.
    async fn delete_cloud_config(&self, name: &str) -> Result<()>;

    async fn create_or_update_deployment(
        &self,
        name: &str,
        manifest: &DeploymentManifest,
    ) -> Result<()>;
    async fn delete_deployment(&self, name: &str) -> Result<()>;
}

/// Operations against the Identity Service.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    async fn has_client(&self, client_id: &str) -> Result<bool>;
    async fn create_client(
        &self,
        client_id: &str,
        secret: &SecretString,
        authorities: &[&str],
    ) -> Result<()>;
    async fn delete_client(&self, client_id: &str) -> Result<()>;
}

/// Where and as whom to reach the Identity Service.
#[derive(Debug, Clone)]
pub struct IdentityEndpoint {
    pub url: String,
    pub ca_cert: String,
    pub client_id: String,
    pub client_secret: SecretString,
}

/// Where to reach a Director, and the identity used to get its tokens.
#[derive(Debug, Clone)]
pub struct DirectorEndpoint {
    pub url: String,
    pub ca_cert: String,
    pub auth: IdentityEndpoint,
}

/// HTTP client settings shared by all remote clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpSettings {
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub task_poll_interval: Duration,
    /// Longest wait for a Director task to finish. `None` waits indefinitely.
    pub task_timeout: Option<Duration>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
            task_poll_interval: Duration::from_secs(1),
            task_timeout: Some(Duration::from_secs(3600)),
        }
    }
}

/// Builds clients for resolved endpoints.
pub trait ClientFactory: Send + Sync {
    fn director(&self, endpoint: &DirectorEndpoint) -> Result<Arc<dyn DirectorClient>>;
    fn identity(&self, endpoint: &IdentityEndpoint) -> Result<Arc<dyn IdentityClient>>;
}

/// Identifies a client by where it connects and whose tokens it uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    url: String,
    ca_cert: String,
    auth_url: String,
    client_id: String,
}

struct CachedClient<C> {
    secret: SecretString,
    client: Arc<C>,
}

type ClientCache<C> = Mutex<HashMap<ClientKey, CachedClient<C>>>;

/// Factory producing HTTP clients.
///
/// Clients are kept per endpoint so their access tokens are reused across
/// reconciles. A changed client secret replaces the cached client.
#[derive(Default)]
pub struct HttpClientFactory {
    settings: HttpSettings,
    directors: ClientCache<HttpDirectorClient>,
    identities: ClientCache<HttpIdentityClient>,
}

impl HttpClientFactory {
    pub fn new(settings: HttpSettings) -> Self {
        Self {
            settings,
            directors: Mutex::default(),
            identities: Mutex::default(),
        }
    }

    /// Number of Director and Identity Service clients currently cached.
    pub fn cached_clients(&self) -> usize {
        let directors = self.directors.lock().map(|c| c.len()).unwrap_or(0);
        let identities = self.identities.lock().map(|c| c.len()).unwrap_or(0);
        directors + identities
    }
}

fn cached_client<C>(
    cache: &ClientCache<C>,
    key: ClientKey,
    secret: &SecretString,
    build: impl FnOnce() -> Result<C>,
) -> Result<Arc<C>> {
    let mut cache = cache
        .lock()
        .map_err(|_| RemoteError::Protocol("client cache lock poisoned".to_string()))?;
    if let Some(entry) = cache.get(&key) {
        if entry.secret.expose_secret() == secret.expose_secret() {
            return Ok(Arc::clone(&entry.client));
        }
        debug!("Credentials for '{}' changed, rebuilding client", key.client_id);
    }

    let client = Arc::new(build()?);
    cache.insert(
        key,
        CachedClient {
            secret: secret.clone(),
            client: Arc::clone(&client),
        },
    );
    Ok(client)
}

impl ClientFactory for HttpClientFactory {
    fn director(&self, endpoint: &DirectorEndpoint) -> Result<Arc<dyn DirectorClient>> {
        let key = ClientKey {
            url: endpoint.url.clone(),
            ca_cert: endpoint.ca_cert.clone(),
            auth_url: endpoint.auth.url.clone(),
            client_id: endpoint.auth.client_id.clone(),
        };
        let client = cached_client(&self.directors, key, &endpoint.auth.client_secret, || {
            HttpDirectorClient::new(endpoint, self.settings)
        })?;
        Ok(client)
    }

    fn identity(&self, endpoint: &IdentityEndpoint) -> Result<Arc<dyn IdentityClient>> {
        let key = ClientKey {
            url: endpoint.url.clone(),
            ca_cert: endpoint.ca_cert.clone(),
            auth_url: endpoint.url.clone(),
            client_id: endpoint.client_id.clone(),
        };
        let client = cached_client(&self.identities, key, &endpoint.client_secret, || {
            HttpIdentityClient::new(endpoint, self.settings)
        })?;
        Ok(client)
    }
}

/// Builds a reqwest client trusting `ca_cert` (PEM) in addition to the system roots.
pub(crate) fn build_http_client(
    ca_cert: &str,
    settings: HttpSettings,
    follow_redirects: bool,
) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.timeout);

    if !follow_redirects {
        builder = builder.redirect(reqwest::redirect::Policy::none());
    }

    if !ca_cert.trim().is_empty() {
        let cert = reqwest::Certificate::from_pem(ca_cert.as_bytes())
            .map_err(|e| RemoteError::Certificate(e.to_string()))?;
        builder = builder.add_root_certificate(cert);
    }

    builder.build().map_err(|e| RemoteError::Http {
        url: String::new(),
        source: e,
    })
}

/// Joins a base URL and a path without doubling slashes.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
