//! HTTP client for the Identity Service client-management API.

use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::error::{RemoteError, Result};
use super::token::{sanitize_error_body, TokenSource};
use super::{build_http_client, join_url, HttpSettings, IdentityClient, IdentityEndpoint};

const SERVICE: &str = "Identity Service";

#[derive(Debug, Deserialize)]
struct ClientList {
    #[serde(default)]
    resources: Vec<ClientSummary>,
}

#[derive(Debug, Deserialize)]
struct ClientSummary {
    client_id: String,
}

#[derive(Debug, Serialize)]
struct NewClient<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    authorized_grant_types: [&'a str; 1],
    scope: [&'a str; 1],
    authorities: &'a [&'a str],
}

/// Identity Service client authenticated as an admin client.
pub struct HttpIdentityClient {
    client: Client,
    base_url: String,
    tokens: TokenSource,
}

impl HttpIdentityClient {
    pub fn new(endpoint: &IdentityEndpoint, settings: HttpSettings) -> Result<Self> {
        Ok(Self {
            client: build_http_client(&endpoint.ca_cert, settings, true)?,
            base_url: endpoint.url.clone(),
            tokens: TokenSource::new(endpoint, settings)?,
        })
    }

    async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        let token = self.tokens.bearer().await?;
        Ok(self
            .client
            .request(method, url)
            .bearer_auth(token.expose_secret())
            .header(reqwest::header::ACCEPT, "application/json"))
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
}

#[async_trait]
impl IdentityClient for HttpIdentityClient {
    async fn has_client(&self, client_id: &str) -> Result<bool> {
        let url = join_url(&self.base_url, "oauth/clients");
        let filter = format!("client_id eq \"{}\"", client_id);
        let request = self
            .request(Method::GET, &url)
            .await?
            .query(&[("filter", filter.as_str()), ("count", "2")]);
        let response = self.send(request, &url).await?;
        if !response.status().is_success() {
            return Err(Self::status_error(response, &url).await);
        }

        let list: ClientList = response
            .json()
            .await
            .map_err(|e| RemoteError::Protocol(format!("Invalid client list: {}", e)))?;
        let present = list.resources.len() == 1 && list.resources[0].client_id == client_id;
        debug!("Identity client '{}' present: {}", client_id, present);
        Ok(present)
    }

    async fn create_client(
        &self,
        client_id: &str,
        secret: &SecretString,
        authorities: &[&str],
    ) -> Result<()> {
        info!("Creating identity client '{}'", client_id);
        let url = join_url(&self.base_url, "oauth/clients");
        let request = self.request(Method::POST, &url).await?.json(&NewClient {
            client_id,
            client_secret: secret.expose_secret(),
            authorized_grant_types: ["client_credentials"],
            scope: ["uaa.none"],
            authorities,
        });
        let response = self.send(request, &url).await?;
        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::CONFLICT => {
                debug!("Identity client '{}' already exists", client_id);
                Ok(())
            }
            _ => Err(Self::status_error(response, &url).await),
        }
    }

    async fn delete_client(&self, client_id: &str) -> Result<()> {
        info!("Deleting identity client '{}'", client_id);
        let url = join_url(&self.base_url, &format!("oauth/clients/{}", client_id));
        let request = self.request(Method::DELETE, &url).await?;
        let response = self.send(request, &url).await?;
        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Ok(()),
            _ => Err(Self::status_error(response, &url).await),
        }
    }
}
