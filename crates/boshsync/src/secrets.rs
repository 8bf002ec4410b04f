//! Credential storage and secret resolution.
//!
//! Records never carry credentials. They name a secret by namespace and name,
//! and the reconciler reads it from a [`SecretStore`]. Values for the store
//! are seeded from configuration, where each may be given:
//!
//! 1. **Direct value** for quick local testing (`value: "s3cret"`)
//! 2. **File reference** for mounted secrets (`file: /run/secrets/uaa`)
//! 3. **Env var reference** (`env: UAA_ADMIN_SECRET`)

use std::collections::BTreeMap;
use std::fs;
use std::sync::RwLock;

use async_trait::async_trait;
use secrecy::SecretString;

/// Length of generated client secrets.
pub const GENERATED_SECRET_LENGTH: usize = 20;

const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Error type for secret storage and resolution failures.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need one of: direct value, file path, or env var name)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },

    #[error("Secret '{namespace}/{name}' not found")]
    NotFound { namespace: String, name: String },

    #[error("Secret '{namespace}/{name}' already exists")]
    AlreadyExists { namespace: String, name: String },

    #[error("Failed to generate random bytes: {0}")]
    Random(String),

    #[error("Secret store lock poisoned")]
    LockPoisoned,
}

impl SecretError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SecretError::NotFound { .. })
    }
}

/// Result type for secret operations.
pub type Result<T> = std::result::Result<T, SecretError>;

/// Namespaced secret storage.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> Result<SecretString>;

    /// Stores a new secret. Fails with `AlreadyExists` if the name is taken.
    async fn create(&self, namespace: &str, name: &str, value: SecretString) -> Result<()>;

    async fn delete(&self, namespace: &str, name: &str) -> Result<()>;
}

/// Secret store kept in memory.
#[derive(Default)]
pub struct MemorySecretStore {
    secrets: RwLock<BTreeMap<(String, String), SecretString>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored secrets.
    pub fn len(&self) -> usize {
        self.secrets.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, namespace: &str, name: &str) -> bool {
        self.secrets
            .read()
            .map(|s| s.contains_key(&(namespace.to_string(), name.to_string())))
            .unwrap_or(false)
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<SecretString> {
        let secrets = self.secrets.read().map_err(|_| SecretError::LockPoisoned)?;
        secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| SecretError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn create(&self, namespace: &str, name: &str, value: SecretString) -> Result<()> {
        let mut secrets = self.secrets.write().map_err(|_| SecretError::LockPoisoned)?;
        let key = (namespace.to_string(), name.to_string());
        if secrets.contains_key(&key) {
            return Err(SecretError::AlreadyExists {
                namespace: namespace.to_string(),
                name: name.to_string(),
            });
        }
        secrets.insert(key, value);
        Ok(())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        let mut secrets = self.secrets.write().map_err(|_| SecretError::LockPoisoned)?;
        secrets
            .remove(&(namespace.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| SecretError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }
}

/// Returns the stored secret, generating and storing one if it does not exist.
///
/// A concurrent creator winning the race is fine: its value is read back.
pub async fn get_or_generate(
    store: &dyn SecretStore,
    namespace: &str,
    name: &str,
) -> Result<SecretString> {
    match store.get(namespace, name).await {
        Ok(secret) => return Ok(secret),
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e),
    }

    log::info!("Generating secret '{}/{}'", namespace, name);
    let secret = generate_secret()?;
    match store.create(namespace, name, secret.clone()).await {
        Ok(()) => Ok(secret),
        Err(SecretError::AlreadyExists { .. }) => store.get(namespace, name).await,
        Err(e) => Err(e),
    }
}

/// Generates a random alphanumeric secret of [`GENERATED_SECRET_LENGTH`] characters.
pub fn generate_secret() -> Result<SecretString> {
    // Largest multiple of the alphabet size below 256; bytes above it are
    // rejected so every character is equally likely.
    const LIMIT: u8 = (256 / ALPHABET.len() * ALPHABET.len()) as u8;

    let mut out = String::with_capacity(GENERATED_SECRET_LENGTH);
    let mut buf = [0u8; 32];
    while out.len() < GENERATED_SECRET_LENGTH {
        getrandom::fill(&mut buf).map_err(|e| SecretError::Random(e.to_string()))?;
        for &byte in buf.iter().filter(|&&b| b < LIMIT) {
            if out.len() == GENERATED_SECRET_LENGTH {
                break;
            }
            out.push(ALPHABET[(byte as usize) % ALPHABET.len()] as char);
        }
    }
    Ok(SecretString::from(out))
}

/// Resolves a secret from multiple sources in priority order:
/// 1. Direct value (if provided and non-empty)
/// 2. File contents (if path provided)
/// 3. Environment variable (if name provided)
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = direct.filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = file_path.filter(|p| !p.is_empty()) {
        let expanded = expand_home(path);
        return fs::read_to_string(&expanded)
            .map(|content| SecretString::from(content.trim().to_string()))
            .map_err(|source| SecretError::FileReadError {
                path: expanded,
                source,
            });
    }

    if let Some(var_name) = env_var.filter(|v| !v.is_empty()) {
        return match std::env::var(var_name) {
            // Env vars may carry a trailing newline.
            Ok(value) => Ok(SecretString::from(value.trim())),
            Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: var_name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: var_name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

/// Checks if at least one secret source is configured (non-empty).
pub fn has_secret_source(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> bool {
    direct.is_some_and(|s| !s.is_empty())
        || file_path.is_some_and(|s| !s.is_empty())
        || env_var.is_some_and(|s| !s.is_empty())
}

/// Expands a leading `~` to the user's home directory. `~user` is not supported.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            let home = home.to_string_lossy();
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    #[serial]
    fn test_direct_value_takes_priority() {
        std::env::set_var("BOSHSYNC_TEST_SECRET_1", "env_value");
        let result =
            resolve_secret(Some("direct_value"), None, Some("BOSHSYNC_TEST_SECRET_1")).unwrap();
        assert_eq!(result.expose_secret(), "direct_value");
        std::env::remove_var("BOSHSYNC_TEST_SECRET_1");
    }

    #[test]
    #[serial]
    fn test_file_takes_priority_over_env() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "file_value").unwrap();

        std::env::set_var("BOSHSYNC_TEST_SECRET_2", "env_value");
        let result = resolve_secret(
            None,
            Some(temp_file.path().to_str().unwrap()),
            Some("BOSHSYNC_TEST_SECRET_2"),
        )
        .unwrap();
        assert_eq!(result.expose_secret(), "file_value");
        std::env::remove_var("BOSHSYNC_TEST_SECRET_2");
    }

    #[test]
    #[serial]
    fn test_env_var_fallback_is_trimmed() {
        std::env::set_var("BOSHSYNC_TEST_SECRET_3", "env_value\n");
        let result = resolve_secret(None, None, Some("BOSHSYNC_TEST_SECRET_3")).unwrap();
        assert_eq!(result.expose_secret(), "env_value");
        std::env::remove_var("BOSHSYNC_TEST_SECRET_3");
    }

    #[test]
    fn test_missing_sources() {
        assert!(matches!(
            resolve_secret(None, Some(""), None),
            Err(SecretError::NoSourceProvided)
        ));
        assert!(matches!(
            resolve_secret(None, Some("/nonexistent/path/to/secret"), None),
            Err(SecretError::FileReadError { .. })
        ));
        assert!(matches!(
            resolve_secret(None, None, Some("BOSHSYNC_DEFINITELY_NOT_SET_12345")),
            Err(SecretError::EnvVarNotSet { .. })
        ));
    }

    #[test]
    fn test_has_secret_source() {
        assert!(has_secret_source(None, Some("/path"), None));
        assert!(!has_secret_source(Some(""), Some(""), Some("")));
    }

    #[test]
    fn test_generated_secret_shape() {
        let a = generate_secret().unwrap();
        let b = generate_secret().unwrap();
        assert_eq!(a.expose_secret().len(), GENERATED_SECRET_LENGTH);
        assert!(a.expose_secret().chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a.expose_secret(), b.expose_secret());
    }

    #[tokio::test]
    async fn test_memory_store_lifecycle() {
        let store = MemorySecretStore::new();
        store
            .create("bosh-system", "uaa-admin", SecretString::from("x"))
            .await
            .unwrap();
        assert!(matches!(
            store
                .create("bosh-system", "uaa-admin", SecretString::from("y"))
                .await,
            Err(SecretError::AlreadyExists { .. })
        ));
        assert_eq!(
            store.get("bosh-system", "uaa-admin").await.unwrap().expose_secret(),
            "x"
        );

        store.delete("bosh-system", "uaa-admin").await.unwrap();
        assert!(store
            .delete("bosh-system", "uaa-admin")
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_get_or_generate_is_stable() {
        let store = MemorySecretStore::new();
        let first = get_or_generate(&store, "bosh-system", "team.ns.dev").await.unwrap();
        let second = get_or_generate(&store, "bosh-system", "team.ns.dev").await.unwrap();
        assert_eq!(first.expose_secret(), second.expose_secret());
        assert_eq!(store.len(), 1);
    }
}
