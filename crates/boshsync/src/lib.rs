pub mod config;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod reconcile;
pub mod remote;
pub mod resolver;
pub mod resource;
pub mod secrets;
pub mod store;
pub mod validation;

pub use config::{ConfigError, OperatorConfig};
pub use error::{ReconcileError, Result};
pub use logging::init_logging;
pub use manifest::{ManifestError, ManifestLoader};
pub use reconcile::{Reconciler, SweepReport, SweepScheduler, Sweeper};
pub use remote::{ClientFactory, HttpClientFactory, RecordingFactory, RemoteError};
pub use resolver::{DeploymentResolver, ResolutionError};
pub use resource::{AnyRecord, RecordKey, ResourceKind};
pub use secrets::{MemorySecretStore, SecretError, SecretStore};
pub use store::{MemoryStore, RecordStore, StoreError};
pub use validation::RecordValidator;
