//! Operator configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::remote::HttpSettings;
use crate::secrets::{has_secret_source, resolve_secret, SecretError, SecretStore};
use crate::validation::is_dns_label;

/// Environment variable overriding [`OperatorConfig::system_namespace`].
pub const SYSTEM_NAMESPACE_ENV_VAR: &str = "BOSHSYNC_SYSTEM_NAMESPACE";

pub const DEFAULT_SYSTEM_NAMESPACE: &str = "bosh-system";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Failed to seed secret '{namespace}/{name}': {source}")]
    Secret {
        namespace: String,
        name: String,
        #[source]
        source: SecretError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    /// Namespace holding Director records, Compilation records and admin secrets.
    pub system_namespace: String,

    /// Directory of record manifests loaded at startup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifests_dir: Option<PathBuf>,

    pub logging: LoggingConfig,
    pub http: HttpConfig,
    pub sweep: SweepConfig,

    /// Secrets placed in the secret store at startup.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<SecretSource>,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            system_namespace: DEFAULT_SYSTEM_NAMESPACE.to_string(),
            manifests_dir: None,
            logging: LoggingConfig::default(),
            http: HttpConfig::default(),
            sweep: SweepConfig::default(),
            secrets: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
    pub task_poll_interval_ms: u64,
    /// Longest wait for a Director task, 0 for no limit.
    pub task_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            timeout_secs: 30,
            task_poll_interval_ms: 1000,
            task_timeout_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub interval_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self { interval_secs: 30 }
    }
}

/// A secret and where its value comes from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretSource {
    /// Defaults to the system namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
}

impl OperatorConfig {
    /// `<config_dir>/boshsync/config.yaml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("boshsync").join("config.yaml"))
    }

    /// Loads, applies env overrides and validates.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_yaml(&content)
    }

    /// Loads from the default path, or falls back to defaults when no file exists there.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => {
                log::debug!("No config file found, using defaults");
                let mut config = Self::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut config: OperatorConfig = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(namespace) = std::env::var(SYSTEM_NAMESPACE_ENV_VAR) {
            if !namespace.trim().is_empty() {
                self.system_namespace = namespace.trim().to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if !is_dns_label(&self.system_namespace) {
            errors.push(format!(
                "system_namespace '{}' is not a valid DNS label",
                self.system_namespace
            ));
        }
        if self.http.timeout_secs == 0 {
            errors.push("http.timeout_secs must be greater than 0".to_string());
        }
        if self.http.task_poll_interval_ms == 0 {
            errors.push("http.task_poll_interval_ms must be greater than 0".to_string());
        }
        if self.sweep.interval_secs == 0 {
            errors.push("sweep.interval_secs must be greater than 0".to_string());
        }

        for secret in &self.secrets {
            if secret.name.is_empty() {
                errors.push("secrets: name is required".to_string());
            }
            if !has_secret_source(
                secret.value.as_deref(),
                secret.file.as_deref(),
                secret.env.as_deref(),
            ) {
                errors.push(format!(
                    "secrets.{}: one of value, file or env is required",
                    secret.name
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation {
                message: errors.join("; "),
            })
        }
    }

    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            connect_timeout: Duration::from_secs(self.http.connect_timeout_secs),
            timeout: Duration::from_secs(self.http.timeout_secs),
            task_poll_interval: Duration::from_millis(self.http.task_poll_interval_ms),
            task_timeout: match self.http.task_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep.interval_secs)
    }

    /// Resolves every configured secret and stores it. Existing secrets are kept.
    ///
    /// Returns the number of secrets newly stored.
    pub async fn seed_secrets(&self, store: &dyn SecretStore) -> Result<usize, ConfigError> {
        let mut seeded = 0;
        for source in &self.secrets {
            let namespace = source
                .namespace
                .clone()
                .unwrap_or_else(|| self.system_namespace.clone());
            let wrap = |e: SecretError| ConfigError::Secret {
                namespace: namespace.clone(),
                name: source.name.clone(),
                source: e,
            };

            let value = resolve_secret(
                source.value.as_deref(),
                source.file.as_deref(),
                source.env.as_deref(),
            )
            .map_err(wrap)?;
            match store.create(&namespace, &source.name, value).await {
                Ok(()) => seeded += 1,
                Err(SecretError::AlreadyExists { .. }) => {
                    log::debug!("Secret '{}/{}' already present", namespace, source.name);
                }
                Err(e) => return Err(wrap(e)),
            }
        }
        Ok(seeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::MemorySecretStore;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    #[serial]
    fn test_defaults() {
        std::env::remove_var(SYSTEM_NAMESPACE_ENV_VAR);
        let config = OperatorConfig::from_yaml("").unwrap();
        assert_eq!(config.system_namespace, "bosh-system");
        assert_eq!(config.http_settings(), HttpSettings::default());
        assert_eq!(config.sweep_interval(), Duration::from_secs(30));
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        std::env::remove_var(SYSTEM_NAMESPACE_ENV_VAR);
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "system_namespace: ops\nlogging:\n  level: debug\n  json: true\nhttp:\n  timeout_secs: 5\n"
        )
        .unwrap();

        let config = OperatorConfig::load(file.path()).unwrap();
        assert_eq!(config.system_namespace, "ops");
        assert!(config.logging.json);
        assert_eq!(config.http.timeout_secs, 5);
        assert_eq!(config.http.connect_timeout_secs, 10);
    }

    #[test]
    #[serial]
    fn test_zero_task_timeout_waits_indefinitely() {
        std::env::remove_var(SYSTEM_NAMESPACE_ENV_VAR);
        let config = OperatorConfig::from_yaml("http:\n  task_timeout_secs: 0\n").unwrap();
        assert_eq!(config.http_settings().task_timeout, None);

        let config = OperatorConfig::from_yaml("http:\n  task_timeout_secs: 90\n").unwrap();
        assert_eq!(
            config.http_settings().task_timeout,
            Some(Duration::from_secs(90))
        );
    }

    #[test]
    #[serial]
    fn test_env_overrides_namespace() {
        std::env::set_var(SYSTEM_NAMESPACE_ENV_VAR, "from-env");
        let config = OperatorConfig::from_yaml("system_namespace: ops\n").unwrap();
        assert_eq!(config.system_namespace, "from-env");
        std::env::remove_var(SYSTEM_NAMESPACE_ENV_VAR);
    }

    #[test]
    #[serial]
    fn test_validation_collects_errors() {
        std::env::remove_var(SYSTEM_NAMESPACE_ENV_VAR);
        let err = OperatorConfig::from_yaml(
            "system_namespace: Not_A_Label\nsweep:\n  interval_secs: 0\nsecrets:\n  - name: uaa\n",
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("system_namespace"));
        assert!(message.contains("sweep.interval_secs"));
        assert!(message.contains("secrets.uaa"));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            OperatorConfig::load("/nonexistent/boshsync.yaml"),
            Err(ConfigError::ReadFile { .. })
        ));
    }

    #[tokio::test]
    async fn test_seed_secrets_keeps_existing() {
        let config = OperatorConfig {
            secrets: vec![
                SecretSource {
                    name: "uaa-admin".into(),
                    value: Some("s3cret".into()),
                    ..Default::default()
                },
                SecretSource {
                    namespace: Some("team-a".into()),
                    name: "other".into(),
                    value: Some("x".into()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let store = MemorySecretStore::new();
        assert_eq!(config.seed_secrets(&store).await.unwrap(), 2);
        assert_eq!(config.seed_secrets(&store).await.unwrap(), 0);
        assert_eq!(
            store
                .get("bosh-system", "uaa-admin")
                .await
                .unwrap()
                .expose_secret(),
            "s3cret"
        );
        assert!(store.contains("team-a", "other"));
    }
}
