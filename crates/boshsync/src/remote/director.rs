//! HTTP client for the Director REST API.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use super::error::{RemoteError, Result};
use super::payload::{CloudConfig, DeploymentManifest};
use super::token::{sanitize_error_body, TokenSource};
use super::{build_http_client, join_url, DirectorClient, DirectorEndpoint, HttpSettings};

const SERVICE: &str = "Director";
const CLOUD_CONFIG_TYPE: &str = "cloud";

#[derive(Debug, Deserialize)]
struct ReleaseInfo {
    name: String,
    #[serde(default)]
    release_versions: Vec<ReleaseVersionInfo>,
}

#[derive(Debug, Deserialize)]
struct ReleaseVersionInfo {
    version: String,
}

#[derive(Debug, Deserialize)]
struct StemcellInfo {
    name: String,
    version: String,
}

#[derive(Debug, Serialize)]
struct UploadRequest<'a> {
    location: &'a str,
    sha1: &'a str,
}

#[derive(Debug, Serialize)]
struct ConfigRequest<'a> {
    #[serde(rename = "type")]
    config_type: &'a str,
    name: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_latest_id: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigDiff {
    #[serde(default)]
    from: Option<ConfigDiffFrom>,
    #[serde(default)]
    diff: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ConfigDiffFrom {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TaskInfo {
    id: u64,
    state: String,
    #[serde(default)]
    result: Option<String>,
}

/// What to do after reading a task's state.
#[derive(Debug)]
enum TaskProgress {
    Done,
    Pending,
    Failed(RemoteError),
}

/// Classifies a polled task, giving up once `waited` reaches `timeout`.
fn task_progress(task: TaskInfo, waited: Duration, timeout: Option<Duration>) -> TaskProgress {
    match task.state.as_str() {
        "done" => TaskProgress::Done,
        "queued" | "processing" | "cancelling" => match timeout {
            Some(limit) if waited >= limit => TaskProgress::Failed(RemoteError::TaskTimeout {
                id: task.id,
                state: task.state,
                waited_secs: waited.as_secs(),
            }),
            _ => TaskProgress::Pending,
        },
        _ => TaskProgress::Failed(RemoteError::Task {
            id: task.id,
            state: task.state,
            result: task.result.unwrap_or_default(),
        }),
    }
}

/// Extracts the task id from a `Location: .../tasks/<id>` redirect.
fn task_id_from_location(location: &str) -> Option<u64> {
    let (_, id) = location.trim_end_matches('/').rsplit_once("/tasks/")?;
    id.parse().ok()
}

/// Director client speaking the REST API with identity-service bearer tokens.
pub struct HttpDirectorClient {
    client: Client,
    base_url: String,
    tokens: TokenSource,
    poll_interval: Duration,
    task_timeout: Option<Duration>,
}

impl HttpDirectorClient {
    pub fn new(endpoint: &DirectorEndpoint, settings: HttpSettings) -> Result<Self> {
        Ok(Self {
            // Redirects point at tasks and are followed by polling instead.
            client: build_http_client(&endpoint.ca_cert, settings, false)?,
            base_url: endpoint.url.clone(),
            tokens: TokenSource::new(&endpoint.auth, settings)?,
            poll_interval: settings.task_poll_interval,
            task_timeout: settings.task_timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        let token = self.tokens.bearer().await?;
        Ok(self
            .client
            .request(method, url)
            .bearer_auth(token.expose_secret()))
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Response> {
        let response = request.send().await.map_err(|e| RemoteError::Http {
            url: url.to_string(),
            source: e,
        })?;

        if response.status() == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
        }
        Ok(response)
    }

    async fn status_error(response: Response, url: &str) -> RemoteError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        RemoteError::Status {
            service: SERVICE,
            url: url.to_string(),
            status,
            body: sanitize_error_body(&body),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        let request = self.request(Method::GET, &url).await?;
        let response = self.send(request, &url).await?;
        if !response.status().is_success() {
            return Err(Self::status_error(response, &url).await);
        }
        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Protocol(format!("Invalid response from '{}': {}", url, e)))
    }

    /// Waits for the task a long-running request redirected to.
    ///
    /// `allow_missing` treats a 404 as success, for deletes.
    async fn complete(&self, response: Response, url: &str, allow_missing: bool) -> Result<()> {
        let status = response.status();
        if allow_missing && status == StatusCode::NOT_FOUND {
            debug!("'{}' already absent", url);
            return Ok(());
        }

        if status.is_redirection() {
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let id = task_id_from_location(&location).ok_or_else(|| {
                RemoteError::Protocol(format!(
                    "Redirect from '{}' does not name a task: '{}'",
                    url, location
                ))
            })?;
            return self.wait_for_task(id).await;
        }

        if status.is_success() {
            return Ok(());
        }
        Err(Self::status_error(response, url).await)
    }

    /// Polls a task until it finishes or `task_timeout` passes.
    ///
    /// Giving up does not cancel the task on the Director; the next reconcile
    /// finds whatever it left behind.
    async fn wait_for_task(&self, id: u64) -> Result<()> {
        debug!("Waiting for Director task {}", id);
        let started = tokio::time::Instant::now();
        loop {
            let task: TaskInfo = self.get_json(&format!("tasks/{}", id)).await?;
            match task_progress(task, started.elapsed(), self.task_timeout) {
                TaskProgress::Done => return Ok(()),
                TaskProgress::Pending => tokio::time::sleep(self.poll_interval).await,
                TaskProgress::Failed(e) => {
                    warn!("Director task {} failed: {}", id, e);
                    return Err(e);
                }
            }
        }
    }

    async fn upload(&self, path: &str, location: &str, sha1: &str) -> Result<()> {
        let url = self.url(path);
        let request = self
            .request(Method::POST, &url)
            .await?
            .json(&UploadRequest { location, sha1 });
        let response = self.send(request, &url).await?;
        self.complete(response, &url, false).await
    }
}

#[async_trait]
impl DirectorClient for HttpDirectorClient {
    async fn has_release(&self, name: &str, version: &str) -> Result<bool> {
        let releases: Vec<ReleaseInfo> = self.get_json("releases").await?;
        Ok(releases
            .iter()
            .filter(|r| r.name == name)
            .any(|r| r.release_versions.iter().any(|v| v.version == version)))
    }

    async fn upload_release(&self, url: &str, sha1: &str) -> Result<()> {
        info!("Uploading release from '{}'", url);
        self.upload("releases", url, sha1).await
    }

    async fn delete_release(&self, name: &str, version: &str) -> Result<()> {
        info!("Deleting release {}/{}", name, version);
        let url = self.url(&format!("releases/{}", name));
        let request = self
            .request(Method::DELETE, &url)
            .await?
            .query(&[("version", version)]);
        let response = self.send(request, &url).await?;
        self.complete(response, &url, true).await
    }

    async fn has_stemcell(&self, name: &str, version: &str) -> Result<bool> {
        let stemcells: Vec<StemcellInfo> = self.get_json("stemcells").await?;
        Ok(stemcells
            .iter()
            .any(|s| s.name == name && s.version == version))
    }

    async fn upload_stemcell(&self, url: &str, sha1: &str) -> Result<()> {
        info!("Uploading stemcell from '{}'", url);
        self.upload("stemcells", url, sha1).await
    }

    async fn delete_stemcell(&self, name: &str, version: &str) -> Result<()> {
        info!("Deleting stemcell {}/{}", name, version);
        let url = self.url(&format!("stemcells/{}/{}", name, version));
        let request = self.request(Method::DELETE, &url).await?;
        let response = self.send(request, &url).await?;
        self.complete(response, &url, true).await
    }

    async fn update_cloud_config(&self, name: &str, config: &CloudConfig) -> Result<()> {
        let content = config.to_yaml()?;

        let diff_url = self.url("configs/diff");
        let request = self
            .request(Method::POST, &diff_url)
            .await?
            .json(&ConfigRequest {
                config_type: CLOUD_CONFIG_TYPE,
                name,
                content: &content,
                expected_latest_id: None,
            });
        let response = self.send(request, &diff_url).await?;
        if !response.status().is_success() {
            return Err(Self::status_error(response, &diff_url).await);
        }
        let diff: ConfigDiff = response.json().await.map_err(|e| {
            RemoteError::Protocol(format!("Invalid config diff for '{}': {}", name, e))
        })?;

        if diff.from.is_some() && diff.diff.is_empty() {
            debug!("Cloud config '{}' is already up to date", name);
            return Ok(());
        }

        info!("Updating cloud config '{}'", name);
        let url = self.url("configs");
        let request = self.request(Method::POST, &url).await?.json(&ConfigRequest {
            config_type: CLOUD_CONFIG_TYPE,
            name,
            content: &content,
            expected_latest_id: diff.from.as_ref().map(|f| f.id.as_str()),
        });
        let response = self.send(request, &url).await?;
        self.complete(response, &url, false).await
    }

    async fn delete_cloud_config(&self, name: &str) -> Result<()> {
        info!("Deleting cloud config '{}'", name);
        let url = self.url("configs");
        let request = self
            .request(Method::DELETE, &url)
            .await?
            .query(&[("type", CLOUD_CONFIG_TYPE), ("name", name)]);
        let response = self.send(request, &url).await?;
        self.complete(response, &url, true).await
    }

    async fn create_or_update_deployment(
        &self,
        name: &str,
        manifest: &DeploymentManifest,
    ) -> Result<()> {
        info!("Deploying '{}'", name);
        let body = manifest.to_yaml()?;
        let url = self.url("deployments");
        let request = self
            .request(Method::POST, &url)
            .await?
            .header(reqwest::header::CONTENT_TYPE, "text/yaml")
            .body(body);
        let response = self.send(request, &url).await?;
        self.complete(response, &url, false).await
    }

    async fn delete_deployment(&self, name: &str) -> Result<()> {
        info!("Deleting deployment '{}'", name);
        let url = self.url(&format!("deployments/{}", name));
        let request = self.request(Method::DELETE, &url).await?;
        let response = self.send(request, &url).await?;
        self.complete(response, &url, true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_from_location() {
        assert_eq!(
            task_id_from_location("https://10.0.0.6:25555/tasks/42"),
            Some(42)
        );
        assert_eq!(task_id_from_location("/tasks/7/"), Some(7));
        assert_eq!(task_id_from_location("/deployments/x"), None);
        assert_eq!(task_id_from_location(""), None);
    }

    fn task(state: &str) -> TaskInfo {
        TaskInfo {
            id: 9,
            state: state.into(),
            result: Some("boom".into()),
        }
    }

    #[test]
    fn test_task_progress() {
        let limit = Some(Duration::from_secs(60));
        assert!(matches!(
            task_progress(task("done"), Duration::ZERO, limit),
            TaskProgress::Done
        ));
        assert!(matches!(
            task_progress(task("processing"), Duration::from_secs(59), limit),
            TaskProgress::Pending
        ));
        assert!(matches!(
            task_progress(task("error"), Duration::ZERO, limit),
            TaskProgress::Failed(RemoteError::Task { id: 9, .. })
        ));
    }

    #[test]
    fn test_stuck_task_times_out() {
        let limit = Some(Duration::from_secs(60));
        match task_progress(task("queued"), Duration::from_secs(60), limit) {
            TaskProgress::Failed(RemoteError::TaskTimeout { id, state, waited_secs }) => {
                assert_eq!(id, 9);
                assert_eq!(state, "queued");
                assert_eq!(waited_secs, 60);
            }
            other => panic!("unexpected progress: {:?}", other),
        }
        assert!(matches!(
            task_progress(task("processing"), Duration::from_secs(86_400), None),
            TaskProgress::Pending
        ));
    }

    #[test]
    fn test_release_listing_parses() {
        let json = r#"[{"name":"nginx","release_versions":[{"version":"1.2.0","commit_hash":"abc"}]}]"#;
        let releases: Vec<ReleaseInfo> = serde_json::from_str(json).unwrap();
        assert_eq!(releases[0].name, "nginx");
        assert_eq!(releases[0].release_versions[0].version, "1.2.0");
    }

    #[test]
    fn test_config_request_shape() {
        let body = serde_json::to_value(ConfigRequest {
            config_type: CLOUD_CONFIG_TYPE,
            name: "az.team-a.z1",
            content: "azs: []\n",
            expected_latest_id: Some("12"),
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "type": "cloud",
                "name": "az.team-a.z1",
                "content": "azs: []\n",
                "expected_latest_id": "12"
            })
        );
    }
}
