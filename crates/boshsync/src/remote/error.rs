use thiserror::Error;

/// Errors from calls against the Director or the Identity Service.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("HTTP request to '{url}' failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned HTTP {status} for '{url}': {body}")]
    Status {
        service: &'static str,
        url: String,
        status: u16,
        body: String,
    },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid CA certificate: {0}")]
    Certificate(String),

    #[error("Director task {id} ended in state '{state}': {result}")]
    Task {
        id: u64,
        state: String,
        result: String,
    },

    #[error("Director task {id} still '{state}' after {waited_secs}s")]
    TaskTimeout {
        id: u64,
        state: String,
        waited_secs: u64,
    },

    #[error("Failed to encode payload: {0}")]
    Encode(String),

    #[error("Unexpected response: {0}")]
    Protocol(String),

    #[error("Request rejected: {0}")]
    Rejected(String),
}

impl RemoteError {
    /// Returns true for failures that are likely transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Http { source, .. } => source.is_timeout() || source.is_connect(),
            RemoteError::Status { status, .. } => *status >= 500 || *status == 429,
            RemoteError::TaskTimeout { .. } => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RemoteError>;
