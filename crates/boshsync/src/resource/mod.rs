//! K8s-style record types reconciled against the Director and the Identity Service.

pub mod az;
pub mod base_image;
pub mod cloud;
pub mod compilation;
pub mod deployment;
pub mod director;
pub mod network;
pub mod release;
pub mod role;
pub mod team;
pub mod vm_extension;

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

pub use az::{AzRecord, AzSpec};
pub use base_image::{BaseImageRecord, BaseImageSpec};
pub use cloud::CloudProperties;
pub use compilation::{CompilationRecord, CompilationSpec};
pub use deployment::{
    Container, ContainerResources, DeploymentRecord, DeploymentSpec, DeploymentStatus,
    ExportedConfiguration, ImportedConfiguration, UpdateStrategy,
};
pub use director::{DirectorRecord, DirectorSpec};
pub use network::{NetworkRecord, NetworkSpec, Subnet};
pub use release::{ReleaseRecord, ReleaseSpec};
pub use role::{RoleRecord, RoleSource, RoleSpec};
pub use team::{TeamRecord, TeamSpec, TeamStatus};
pub use vm_extension::{VmExtensionRecord, VmExtensionSpec};

/// The API version for all boshsync records.
pub const API_VERSION: &str = "boshsync.io/v1";

/// Suffix shared by every finalizer token.
pub const FINALIZER_DOMAIN: &str = "finalizers.boshsync.io";

/// Status warning set while a record's spec differs from its frozen spec.
pub const MUTATION_WARNING: &str = "resource has been mutated; all changes ignored";

/// The kind of record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Director,
    Team,
    #[serde(rename = "AZ")]
    Az,
    Network,
    #[serde(alias = "Stemcell")]
    BaseImage,
    Release,
    Role,
    #[serde(rename = "VMExtension", alias = "Extension")]
    VmExtension,
    Compilation,
    Deployment,
}

impl ResourceKind {
    /// Returns all kinds in dependency order: a kind only references kinds before it.
    pub fn all() -> &'static [ResourceKind] {
        &[
            ResourceKind::Director,
            ResourceKind::Team,
            ResourceKind::Az,
            ResourceKind::Network,
            ResourceKind::Compilation,
            ResourceKind::BaseImage,
            ResourceKind::Release,
            ResourceKind::VmExtension,
            ResourceKind::Role,
            ResourceKind::Deployment,
        ]
    }

    /// Lowercase token used in finalizers and internal names.
    pub fn token(&self) -> &'static str {
        match self {
            ResourceKind::Director => "director",
            ResourceKind::Team => "team",
            ResourceKind::Az => "az",
            ResourceKind::Network => "network",
            ResourceKind::BaseImage => "baseimage",
            ResourceKind::Release => "release",
            ResourceKind::Role => "role",
            ResourceKind::VmExtension => "vmextension",
            ResourceKind::Compilation => "compilation",
            ResourceKind::Deployment => "deployment",
        }
    }

    /// The finalizer token guarding remote cleanup for this kind.
    pub fn finalizer(&self) -> &'static str {
        match self {
            ResourceKind::Director => "director.finalizers.boshsync.io",
            ResourceKind::Team => "team.finalizers.boshsync.io",
            ResourceKind::Az => "az.finalizers.boshsync.io",
            ResourceKind::Network => "network.finalizers.boshsync.io",
            ResourceKind::BaseImage => "baseimage.finalizers.boshsync.io",
            ResourceKind::Release => "release.finalizers.boshsync.io",
            ResourceKind::Role => "role.finalizers.boshsync.io",
            ResourceKind::VmExtension => "vmextension.finalizers.boshsync.io",
            ResourceKind::Compilation => "compilation.finalizers.boshsync.io",
            ResourceKind::Deployment => "deployment.finalizers.boshsync.io",
        }
    }

    /// Name used for a record on the remote system.
    ///
    /// Namespaces are DNS labels and never contain `.`, so splitting on the
    /// first two dots recovers kind, namespace and name.
    pub fn internal_name(&self, namespace: &str, name: &str) -> String {
        format!("{}.{}.{}", self.token(), namespace, name)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Director => write!(f, "Director"),
            ResourceKind::Team => write!(f, "Team"),
            ResourceKind::Az => write!(f, "AZ"),
            ResourceKind::Network => write!(f, "Network"),
            ResourceKind::BaseImage => write!(f, "BaseImage"),
            ResourceKind::Release => write!(f, "Release"),
            ResourceKind::Role => write!(f, "Role"),
            ResourceKind::VmExtension => write!(f, "VMExtension"),
            ResourceKind::Compilation => write!(f, "Compilation"),
            ResourceKind::Deployment => write!(f, "Deployment"),
        }
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "director" => Ok(ResourceKind::Director),
            "team" => Ok(ResourceKind::Team),
            "az" => Ok(ResourceKind::Az),
            "network" => Ok(ResourceKind::Network),
            "baseimage" | "stemcell" => Ok(ResourceKind::BaseImage),
            "release" => Ok(ResourceKind::Release),
            "role" => Ok(ResourceKind::Role),
            "vmextension" | "extension" => Ok(ResourceKind::VmExtension),
            "compilation" => Ok(ResourceKind::Compilation),
            "deployment" => Ok(ResourceKind::Deployment),
            _ => Err(format!("Unknown resource kind: {}", s)),
        }
    }
}

/// Identity of a record: kind plus namespace plus name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
}

impl RecordKey {
    pub fn new(kind: ResourceKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// Metadata for a record, following K8s conventions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// The name of the record, unique per kind within its namespace.
    pub name: String,

    /// Scope the record belongs to.
    #[serde(default)]
    pub namespace: String,

    /// Store-assigned unique id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,

    /// Store-assigned version, bumped on every write.
    #[serde(default)]
    pub resource_version: u64,

    /// Set by the store when deletion was requested while finalizers remained.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,

    /// Tokens that block physical deletion.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,

    /// Key-value labels for organizing and selecting records.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,

    /// Key-value annotations for storing additional metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub annotations: HashMap<String, String>,
}

impl ObjectMeta {
    /// Creates metadata with a namespace and a name.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    /// Adds a label to the metadata.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn being_deleted(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    pub fn has_finalizer(&self, token: &str) -> bool {
        self.finalizers.iter().any(|f| f == token)
    }

    /// Adds the token if absent. Returns whether the finalizers changed.
    pub fn ensure_finalizer(&mut self, token: &str) -> bool {
        if self.has_finalizer(token) {
            return false;
        }
        self.finalizers.push(token.to_string());
        true
    }

    /// Removes every copy of the token. Returns whether the finalizers changed.
    pub fn ensure_no_finalizer(&mut self, token: &str) -> bool {
        let before = self.finalizers.len();
        self.finalizers.retain(|f| f != token);
        before != self.finalizers.len()
    }
}

/// A generic K8s-style record wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource<S, St> {
    /// API version, should always be `boshsync.io/v1`.
    pub api_version: String,

    /// The kind of record.
    pub kind: ResourceKind,

    /// Record metadata.
    pub metadata: ObjectMeta,

    /// Desired state, owned by the user.
    pub spec: S,

    /// Observed state, owned by the reconciler.
    #[serde(default)]
    pub status: St,
}

/// Binds a spec type to its kind, its status type and its [`AnyRecord`] variant.
pub trait KindSpec: Sized + Clone + PartialEq + Send + Sync + 'static {
    const KIND: ResourceKind;
    type Status: Clone + Default + PartialEq + Send + Sync + 'static;

    fn wrap(record: Resource<Self, Self::Status>) -> AnyRecord;
    fn unwrap(record: AnyRecord) -> Option<Resource<Self, Self::Status>>;
}

impl<S: KindSpec> Resource<S, S::Status> {
    /// Creates a record with empty status.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, spec: S) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: S::KIND,
            metadata: ObjectMeta::new(namespace, name),
            spec,
            status: S::Status::default(),
        }
    }

    /// Returns the name of the record.
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Returns the namespace of the record.
    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }
}

/// Capabilities shared by every record kind.
pub trait Record: Clone + Send + Sync + 'static {
    const KIND: ResourceKind;
    type Status: Clone + PartialEq + Send + Sync;

    fn metadata(&self) -> &ObjectMeta;
    fn metadata_mut(&mut self) -> &mut ObjectMeta;
    fn status(&self) -> &Self::Status;
    fn into_any(self) -> AnyRecord;
    fn from_any(record: AnyRecord) -> Option<Self>;

    fn key(&self) -> RecordKey {
        RecordKey::new(
            Self::KIND,
            self.metadata().namespace.clone(),
            self.metadata().name.clone(),
        )
    }

    /// Deterministic name of this record on the remote system.
    fn internal_name(&self) -> String {
        Self::KIND.internal_name(&self.metadata().namespace, &self.metadata().name)
    }

    fn being_deleted(&self) -> bool {
        self.metadata().being_deleted()
    }

    fn has_finalizer(&self) -> bool {
        self.metadata().has_finalizer(Self::KIND.finalizer())
    }

    fn ensure_finalizer(&mut self) -> bool {
        self.metadata_mut().ensure_finalizer(Self::KIND.finalizer())
    }

    fn ensure_no_finalizer(&mut self) -> bool {
        self.metadata_mut().ensure_no_finalizer(Self::KIND.finalizer())
    }
}

impl<S: KindSpec> Record for Resource<S, S::Status> {
    const KIND: ResourceKind = S::KIND;
    type Status = S::Status;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn status(&self) -> &Self::Status {
        &self.status
    }

    fn into_any(self) -> AnyRecord {
        S::wrap(self)
    }

    fn from_any(record: AnyRecord) -> Option<Self> {
        S::unwrap(record)
    }
}

// ============================================================================
// Spec Freezing
// ============================================================================

/// Kind-specific equality used for drift detection.
pub trait FrozenSpec: Clone {
    fn matches(&self, other: &Self) -> bool;
}

/// Freezes `spec` into `original` if nothing is frozen yet, otherwise
/// recomputes `warning` from the drift between the two.
///
/// Returns whether either field changed.
pub fn track_drift<S: FrozenSpec>(spec: &S, original: &mut Option<S>, warning: &mut String) -> bool {
    let mutated = match original.as_ref() {
        None => {
            *original = Some(spec.clone());
            warning.clear();
            return true;
        }
        Some(frozen) => !frozen.matches(spec),
    };

    if mutated && warning.as_str() != MUTATION_WARNING {
        *warning = MUTATION_WARNING.to_string();
        true
    } else if !mutated && !warning.is_empty() {
        warning.clear();
        true
    } else {
        false
    }
}

/// Status carried by every kind that freezes its spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrozenStatus<S> {
    /// Non-empty while the live spec differs from the frozen spec.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub warning: String,

    /// The spec captured on the first reconcile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_spec: Option<S>,

    /// Whether the remote object was last seen present.
    #[serde(default)]
    pub available: bool,
}

impl<S> Default for FrozenStatus<S> {
    fn default() -> Self {
        Self {
            warning: String::new(),
            original_spec: None,
            available: false,
        }
    }
}

impl<S: FrozenSpec> FrozenStatus<S> {
    /// Freezes or re-checks drift against `spec`. Returns whether the status changed.
    pub fn prepare(&mut self, spec: &S) -> bool {
        track_drift(spec, &mut self.original_spec, &mut self.warning)
    }
}

/// Status of kinds without observed state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmptyStatus {}

// ============================================================================
// Any Record
// ============================================================================

/// A record of any kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnyRecord {
    Director(DirectorRecord),
    Team(TeamRecord),
    Az(AzRecord),
    Network(NetworkRecord),
    BaseImage(BaseImageRecord),
    Release(ReleaseRecord),
    Role(RoleRecord),
    VmExtension(VmExtensionRecord),
    Compilation(CompilationRecord),
    Deployment(DeploymentRecord),
}

macro_rules! each_record {
    ($value:expr, $record:ident => $body:expr) => {
        match $value {
            AnyRecord::Director($record) => $body,
            AnyRecord::Team($record) => $body,
            AnyRecord::Az($record) => $body,
            AnyRecord::Network($record) => $body,
            AnyRecord::BaseImage($record) => $body,
            AnyRecord::Release($record) => $body,
            AnyRecord::Role($record) => $body,
            AnyRecord::VmExtension($record) => $body,
            AnyRecord::Compilation($record) => $body,
            AnyRecord::Deployment($record) => $body,
        }
    };
}

impl AnyRecord {
    /// Returns the kind of record.
    pub fn kind(&self) -> ResourceKind {
        match self {
            AnyRecord::Director(_) => ResourceKind::Director,
            AnyRecord::Team(_) => ResourceKind::Team,
            AnyRecord::Az(_) => ResourceKind::Az,
            AnyRecord::Network(_) => ResourceKind::Network,
            AnyRecord::BaseImage(_) => ResourceKind::BaseImage,
            AnyRecord::Release(_) => ResourceKind::Release,
            AnyRecord::Role(_) => ResourceKind::Role,
            AnyRecord::VmExtension(_) => ResourceKind::VmExtension,
            AnyRecord::Compilation(_) => ResourceKind::Compilation,
            AnyRecord::Deployment(_) => ResourceKind::Deployment,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        each_record!(self, r => &r.metadata)
    }

    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        each_record!(self, r => &mut r.metadata)
    }

    pub fn api_version(&self) -> &str {
        each_record!(self, r => &r.api_version)
    }

    pub fn key(&self) -> RecordKey {
        let meta = self.metadata();
        RecordKey::new(self.kind(), meta.namespace.clone(), meta.name.clone())
    }

    /// Replaces this record's status with `other`'s.
    ///
    /// Returns false, leaving `self` untouched, when the kinds differ.
    pub fn copy_status_from(&mut self, other: &AnyRecord) -> bool {
        match (self, other) {
            (AnyRecord::Director(a), AnyRecord::Director(b)) => a.status = b.status.clone(),
            (AnyRecord::Team(a), AnyRecord::Team(b)) => a.status = b.status.clone(),
            (AnyRecord::Az(a), AnyRecord::Az(b)) => a.status = b.status.clone(),
            (AnyRecord::Network(a), AnyRecord::Network(b)) => a.status = b.status.clone(),
            (AnyRecord::BaseImage(a), AnyRecord::BaseImage(b)) => a.status = b.status.clone(),
            (AnyRecord::Release(a), AnyRecord::Release(b)) => a.status = b.status.clone(),
            (AnyRecord::Role(a), AnyRecord::Role(b)) => a.status = b.status.clone(),
            (AnyRecord::VmExtension(a), AnyRecord::VmExtension(b)) => {
                a.status = b.status.clone()
            }
            (AnyRecord::Compilation(a), AnyRecord::Compilation(b)) => {
                a.status = b.status.clone()
            }
            (AnyRecord::Deployment(a), AnyRecord::Deployment(b)) => a.status = b.status.clone(),
            _ => return false,
        }
        true
    }

    /// Converts into a typed record, or `None` when the kind differs.
    pub fn into_typed<T: Record>(self) -> Option<T> {
        T::from_any(self)
    }
}

impl<'de> Deserialize<'de> for AnyRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let kind = value
            .get("kind")
            .cloned()
            .ok_or_else(|| D::Error::missing_field("kind"))?;
        let kind: ResourceKind = serde_json::from_value(kind).map_err(D::Error::custom)?;

        let record = match kind {
            ResourceKind::Director => serde_json::from_value(value).map(AnyRecord::Director),
            ResourceKind::Team => serde_json::from_value(value).map(AnyRecord::Team),
            ResourceKind::Az => serde_json::from_value(value).map(AnyRecord::Az),
            ResourceKind::Network => serde_json::from_value(value).map(AnyRecord::Network),
            ResourceKind::BaseImage => serde_json::from_value(value).map(AnyRecord::BaseImage),
            ResourceKind::Release => serde_json::from_value(value).map(AnyRecord::Release),
            ResourceKind::Role => serde_json::from_value(value).map(AnyRecord::Role),
            ResourceKind::VmExtension => {
                serde_json::from_value(value).map(AnyRecord::VmExtension)
            }
            ResourceKind::Compilation => {
                serde_json::from_value(value).map(AnyRecord::Compilation)
            }
            ResourceKind::Deployment => serde_json::from_value(value).map(AnyRecord::Deployment),
        };
        record.map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_kind_from_str() {
        assert_eq!("az".parse::<ResourceKind>().unwrap(), ResourceKind::Az);
        assert_eq!(
            "Stemcell".parse::<ResourceKind>().unwrap(),
            ResourceKind::BaseImage
        );
        assert_eq!(
            "VMExtension".parse::<ResourceKind>().unwrap(),
            ResourceKind::VmExtension
        );
        assert!("bogus".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_finalizer_tokens_follow_kind_tokens() {
        for kind in ResourceKind::all() {
            assert_eq!(
                kind.finalizer(),
                format!("{}.{}", kind.token(), FINALIZER_DOMAIN)
            );
        }
    }

    #[test]
    fn test_internal_name_is_injective_across_dashes() {
        let a = ResourceKind::Az.internal_name("a-b", "c");
        let b = ResourceKind::Az.internal_name("a", "b-c");
        assert_ne!(a, b);
        assert_eq!(a, "az.a-b.c");
        assert_ne!(
            ResourceKind::Az.internal_name("ns", "x"),
            ResourceKind::Network.internal_name("ns", "x")
        );
    }

    #[test]
    fn test_ensure_finalizer_is_idempotent() {
        let mut meta = ObjectMeta::new("team-a", "z1");
        assert!(meta.ensure_finalizer("az.finalizers.boshsync.io"));
        assert!(!meta.ensure_finalizer("az.finalizers.boshsync.io"));
        assert_eq!(meta.finalizers.len(), 1);

        assert!(meta.ensure_no_finalizer("az.finalizers.boshsync.io"));
        assert!(!meta.ensure_no_finalizer("az.finalizers.boshsync.io"));
        assert!(meta.finalizers.is_empty());
    }

    #[test]
    fn test_ensure_no_finalizer_keeps_foreign_tokens() {
        let mut meta = ObjectMeta::new("team-a", "z1");
        meta.finalizers = vec!["other.io/keep".to_string(), "az.finalizers.boshsync.io".to_string()];
        assert!(meta.ensure_no_finalizer("az.finalizers.boshsync.io"));
        assert_eq!(meta.finalizers, vec!["other.io/keep".to_string()]);
    }

    #[test]
    fn test_track_drift_freezes_then_warns_then_clears() {
        #[derive(Clone, PartialEq)]
        struct Plain(u32);
        impl FrozenSpec for Plain {
            fn matches(&self, other: &Self) -> bool {
                self == other
            }
        }

        let mut original = None;
        let mut warning = String::new();

        assert!(track_drift(&Plain(1), &mut original, &mut warning));
        assert!(original.as_ref().map(|p: &Plain| p.0) == Some(1));
        assert!(warning.is_empty());

        assert!(!track_drift(&Plain(1), &mut original, &mut warning));

        assert!(track_drift(&Plain(2), &mut original, &mut warning));
        assert_eq!(warning, MUTATION_WARNING);
        assert!(original.as_ref().map(|p| p.0) == Some(1));

        // Warning is derived, not accumulated.
        assert!(!track_drift(&Plain(3), &mut original, &mut warning));
        assert_eq!(warning, MUTATION_WARNING);

        assert!(track_drift(&Plain(1), &mut original, &mut warning));
        assert!(warning.is_empty());
    }

    #[test]
    fn test_parse_any_record_from_yaml() {
        let yaml = r#"
apiVersion: boshsync.io/v1
kind: AZ
metadata:
  name: z1
  namespace: team-a
spec:
  cloud_properties:
    zone: us-east-1a
"#;
        let record: AnyRecord = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(record.kind(), ResourceKind::Az);
        assert_eq!(record.metadata().name, "z1");

        let az: AzRecord = record.into_typed().unwrap();
        assert_eq!(
            az.spec.cloud_properties,
            Some(CloudProperties::new(json!({"zone": "us-east-1a"})))
        );
        assert_eq!(az.status, FrozenStatus::default());
    }

    #[test]
    fn test_parse_any_record_accepts_kind_aliases() {
        let yaml = r#"
apiVersion: boshsync.io/v1
kind: Stemcell
metadata:
  name: ubuntu
  namespace: team-a
spec:
  baseImageName: bosh-warden-boshlite-ubuntu-jammy-go_agent
  version: "1.200"
  url: https://example.com/stemcell.tgz
  sha1: abc
"#;
        let record: AnyRecord = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(record.kind(), ResourceKind::BaseImage);
    }

    #[test]
    fn test_parse_any_record_without_kind_fails() {
        let yaml = "metadata:\n  name: x\nspec: {}\n";
        assert!(serde_yaml::from_str::<AnyRecord>(yaml).is_err());
    }

    #[test]
    fn test_copy_status_from_rejects_other_kind() {
        let mut az = AzRecord::new("ns", "z1", AzSpec::default()).into_any();
        let network = NetworkRecord::new("ns", "n1", NetworkSpec::default()).into_any();
        assert!(!az.copy_status_from(&network));

        let mut other = AzRecord::new("ns", "z1", AzSpec::default());
        other.status.available = true;
        assert!(az.copy_status_from(&other.into_any()));
        let az: AzRecord = az.into_typed().unwrap();
        assert!(az.status.available);
    }
}
