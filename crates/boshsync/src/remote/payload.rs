//! Payload shapes sent to the Director.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

use super::error::{RemoteError, Result};
use crate::resource::CloudProperties;

// ============================================================================
// Cloud Config
// ============================================================================

/// A named cloud-config fragment. Each record owns exactly one fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub azs: Vec<AzEntry>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vm_extensions: Vec<VmExtensionEntry>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<NetworkEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compilation: Option<CompilationEntry>,
}

impl CloudConfig {
    /// Renders the fragment as the YAML document the Director stores.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| RemoteError::Encode(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AzEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_properties: Option<CloudProperties>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmExtensionEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_properties: Option<CloudProperties>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub network_type: String,
    pub subnets: Vec<SubnetEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubnetEntry {
    pub range: String,
    pub gateway: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reserved: Vec<String>,
    #[serde(rename = "static", default, skip_serializing_if = "Vec::is_empty")]
    pub static_ips: Vec<String>,
    #[serde(default)]
    pub azs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_properties: Option<CloudProperties>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilationEntry {
    pub workers: u32,
    pub az: String,
    pub orphan_workers: bool,
    pub vm_resources: VmResources,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_properties: Option<CloudProperties>,
    pub network: String,
    pub reuse_compilation_vms: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmResources {
    pub cpu: u64,
    pub ram: u64,
    pub ephemeral_disk_size: u64,
}

// ============================================================================
// Deployment Manifest
// ============================================================================

/// Alias every instance group uses to refer to the deployment's single stemcell.
pub const STEMCELL_ALIAS: &str = "stemcell";

/// A complete deployment manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentManifest {
    pub name: String,
    pub releases: Vec<ReleaseRef>,
    pub stemcells: Vec<StemcellRef>,
    pub update: UpdatePolicy,
    pub instance_groups: Vec<InstanceGroup>,
}

impl DeploymentManifest {
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| RemoteError::Encode(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReleaseRef {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StemcellRef {
    pub alias: String,
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatePolicy {
    pub canaries: u32,
    pub max_in_flight: MaxInFlight,
    pub canary_watch_time: WatchTime,
    pub update_watch_time: WatchTime,
    pub serial: bool,
    pub vm_strategy: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceGroup {
    pub name: String,
    pub azs: Vec<String>,
    pub instances: u32,
    pub jobs: Vec<Job>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vm_extensions: Vec<String>,
    pub vm_resources: VmResources,
    pub stemcell: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub persistent_disk_size: u64,
    pub networks: Vec<NetworkRef>,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    pub release: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub consumes: BTreeMap<String, ConsumesLink>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub provides: BTreeMap<String, ProvidesLink>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub properties: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumesLink {
    pub from: String,
    pub deployment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidesLink {
    #[serde(rename = "as")]
    pub alias: String,
    pub shared: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRef {
    pub name: String,
}

/// How many instances may be updated at once.
///
/// Serialized as a bare integer or as a percentage string such as `"25%"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaxInFlight {
    Instances(u32),
    Percent(String),
}

/// How long the Director waits for an instance to become healthy, in milliseconds.
///
/// `Fixed` serializes as an integer, `Range` as the string `"min-max"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchTime {
    Fixed(u64),
    Range { min: u64, max: u64 },
}

impl WatchTime {
    /// Builds the watch window from readiness bounds given in seconds.
    ///
    /// A zero upper bound means a fixed wait of `min_seconds`. Returns `None`
    /// when either bound does not fit in milliseconds.
    pub fn from_seconds(min_seconds: u64, max_seconds: u64) -> Option<Self> {
        let min = min_seconds.checked_mul(1000)?;
        if max_seconds == 0 {
            Some(WatchTime::Fixed(min))
        } else {
            Some(WatchTime::Range {
                min,
                max: max_seconds.checked_mul(1000)?,
            })
        }
    }
}

impl Serialize for WatchTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            WatchTime::Fixed(ms) => serializer.serialize_u64(*ms),
            WatchTime::Range { min, max } => serializer.serialize_str(&format!("{}-{}", min, max)),
        }
    }
}

impl<'de> Deserialize<'de> for WatchTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Fixed(u64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Fixed(ms) => Ok(WatchTime::Fixed(ms)),
            Repr::Text(text) => {
                let parse = |s: &str| {
                    s.trim()
                        .parse::<u64>()
                        .map_err(|_| D::Error::custom(format!("invalid watch time '{}'", text)))
                };
                match text.split_once('-') {
                    Some((min, max)) => Ok(WatchTime::Range {
                        min: parse(min)?,
                        max: parse(max)?,
                    }),
                    None => Ok(WatchTime::Fixed(parse(&text)?)),
                }
            }
        }
    }
}
