//! Client-credentials tokens from the Identity Service.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{debug, info};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;

use super::error::{RemoteError, Result};
use super::{build_http_client, join_url, HttpSettings, IdentityEndpoint};

/// Maximum length for error bodies echoed into errors and logs.
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN_SECS: i64 = 30;

/// Lifetime assumed when the token response carries no `expires_in`.
const DEFAULT_LIFETIME_SECS: u64 = 300;

/// Truncates an error response body so secrets in long payloads stay out of logs.
pub(crate) fn sanitize_error_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated)", &body[..end])
    } else {
        body.to_string()
    }
}

/// Response from the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,

    #[serde(default)]
    pub token_type: Option<String>,

    #[serde(default)]
    pub expires_in: Option<u64>,

    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug)]
struct CachedToken {
    access_token: SecretString,
    expires_at: DateTime<Utc>,
}

/// When a token issued at `now` with a lifetime of `lifetime_secs` expires.
///
/// Lifetimes too large to represent never expire.
fn expiry_after(now: DateTime<Utc>, lifetime_secs: u64) -> DateTime<Utc> {
    i64::try_from(lifetime_secs)
        .ok()
        .and_then(ChronoDuration::try_seconds)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + ChronoDuration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

/// Fetches and caches bearer tokens using the `client_credentials` grant.
pub struct TokenSource {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub fn new(endpoint: &IdentityEndpoint, settings: HttpSettings) -> Result<Self> {
        Ok(Self {
            client: build_http_client(&endpoint.ca_cert, settings, true)?,
            token_url: join_url(&endpoint.url, "oauth/token"),
            client_id: endpoint.client_id.clone(),
            client_secret: endpoint.client_secret.clone(),
            cached: Mutex::new(None),
        })
    }

    /// Returns the token endpoint URL.
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Returns a valid access token, fetching a new one when the cached one is near expiry.
    pub async fn bearer(&self) -> Result<SecretString> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.access_token.clone());
            }
            debug!("Access token for '{}' is about to expire", self.client_id);
        }

        let response = self.request_token().await?;
        let lifetime = response.expires_in.unwrap_or(DEFAULT_LIFETIME_SECS);
        let token = CachedToken {
            access_token: SecretString::from(response.access_token),
            expires_at: expiry_after(Utc::now(), lifetime),
        };
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Drops the cached token so the next call fetches a new one.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    async fn request_token(&self) -> Result<TokenResponse> {
        info!("Requesting access token for client '{}'", self.client_id);

        let params = [("grant_type", "client_credentials"), ("response_type", "token")];

        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(self.client_secret.expose_secret()))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| RemoteError::Http {
                url: self.token_url.clone(),
                source: e,
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Auth(format!(
                "Token request for '{}' failed ({}): {}",
                self.client_id,
                status,
                sanitize_error_body(&body)
            )));
        }

        response.json::<TokenResponse>().await.map_err(|e| {
            RemoteError::Auth(format!("Failed to parse token response: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> IdentityEndpoint {
        IdentityEndpoint {
            url: "https://uaa.example.com:8443/".into(),
            ca_cert: String::new(),
            client_id: "admin".into(),
            client_secret: SecretString::from("s3cret"),
        }
    }

    #[test]
    fn test_token_url() {
        let source = TokenSource::new(&endpoint(), HttpSettings::default()).unwrap();
        assert_eq!(source.token_url(), "https://uaa.example.com:8443/oauth/token");
    }

    #[test]
    fn test_cached_token_freshness() {
        let now = Utc::now();
        let token = CachedToken {
            access_token: SecretString::from("t"),
            expires_at: now + ChronoDuration::seconds(EXPIRY_MARGIN_SECS + 60),
        };
        assert!(token.is_fresh(now));

        let stale = CachedToken {
            access_token: SecretString::from("t"),
            expires_at: now + ChronoDuration::seconds(EXPIRY_MARGIN_SECS - 1),
        };
        assert!(!stale.is_fresh(now));
    }

    #[test]
    fn test_expiry_tolerates_huge_lifetimes() {
        let now = Utc::now();
        assert_eq!(expiry_after(now, 600), now + ChronoDuration::seconds(600));
        assert_eq!(expiry_after(now, u64::MAX), DateTime::<Utc>::MAX_UTC);
        assert_eq!(expiry_after(now, i64::MAX as u64), DateTime::<Utc>::MAX_UTC);

        let token = CachedToken {
            access_token: SecretString::from("t"),
            expires_at: expiry_after(now, u64::MAX),
        };
        assert!(token.is_fresh(now));
    }

    #[test]
    fn test_sanitize_error_body() {
        let long = "x".repeat(500);
        let sanitized = sanitize_error_body(&long);
        assert!(sanitized.ends_with("... (truncated)"));
        assert_eq!(sanitize_error_body("short"), "short");
    }

    #[test]
    fn test_token_response_parses() {
        let json = r#"{"access_token":"abc","token_type":"bearer","expires_in":599,"scope":"bosh.admin","jti":"x"}"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(token.access_token, "abc");
        assert_eq!(token.expires_in, Some(599));
    }
}
