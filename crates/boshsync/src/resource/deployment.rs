//! Deployments: one instance group composed from roles, releases and infrastructure records.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{AnyRecord, KindSpec, Record, Resource, ResourceKind};
use crate::error::Result;
use crate::reconcile::artifact::DirectorArtifact;
use crate::remote::DirectorClient;
use crate::resolver::DeploymentResolver;
use crate::store::RecordLookup;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    /// AZ record names. Order is kept in the manifest.
    pub azs: Vec<String>,

    pub replicas: u32,

    pub containers: Vec<Container>,

    /// VM extension record names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<String>,

    pub base_image: String,

    pub network: String,

    #[serde(default)]
    pub update_strategy: UpdateStrategy,

    /// Requests one more reconcile. Cleared once consumed.
    #[serde(default)]
    pub force_reconciliation: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Container {
    /// Role record name.
    pub role: String,

    /// Keyed by the externally visible link name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub exported_configuration: BTreeMap<String, ExportedConfiguration>,

    /// Keyed by the upstream deployment's link name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub imported_configuration: BTreeMap<String, ImportedConfiguration>,

    #[serde(default)]
    pub resources: ContainerResources,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerResources {
    #[serde(default)]
    pub ram: u64,
    #[serde(default)]
    pub cpu: u64,
    #[serde(default)]
    pub ephemeral_disk_size: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub persistent_disk_size: u64,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedConfiguration {
    pub internal_link: String,
    #[serde(default)]
    pub exported: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedConfiguration {
    pub internal_link: String,
    /// Name of the Deployment record providing the link.
    pub imported_from: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStrategy {
    #[serde(default)]
    pub min_ready_seconds: u64,
    #[serde(default)]
    pub max_ready_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_unavailable_percent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_unavailable_replicas: Option<u32>,
    /// VM update strategy, `delete-create` when unset.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub strategy_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentStatus {
    #[serde(default)]
    pub available: bool,
}

impl KindSpec for DeploymentSpec {
    const KIND: ResourceKind = ResourceKind::Deployment;
    type Status = DeploymentStatus;

    fn wrap(record: Resource<Self, Self::Status>) -> AnyRecord {
        AnyRecord::Deployment(record)
    }

    fn unwrap(record: AnyRecord) -> Option<Resource<Self, Self::Status>> {
        match record {
            AnyRecord::Deployment(r) => Some(r),
            _ => None,
        }
    }
}

pub type DeploymentRecord = Resource<DeploymentSpec, DeploymentStatus>;

impl DeploymentRecord {
    /// Clears a pending force flag. Returns whether it was set.
    pub fn consume_force_flag(&mut self) -> bool {
        std::mem::take(&mut self.spec.force_reconciliation)
    }
}

#[async_trait]
impl DirectorArtifact for DeploymentRecord {
    /// Deployments are rebuilt from their references every time, so there is
    /// nothing to freeze.
    fn prepare_to_save(&mut self) -> bool {
        false
    }

    async fn create_unless_exists(
        &mut self,
        director: &dyn DirectorClient,
        lookup: &dyn RecordLookup,
    ) -> Result<()> {
        let manifest = DeploymentResolver::new(lookup).resolve(self).await?;
        director
            .create_or_update_deployment(&self.internal_name(), &manifest)
            .await?;
        self.status.available = true;
        Ok(())
    }

    async fn delete_if_exists(&self, director: &dyn DirectorClient) -> Result<()> {
        director.delete_deployment(&self.internal_name()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_deployment_spec() {
        let yaml = r#"
azs: [z1, z2]
replicas: 2
containers:
  - role: nginx
    exported_configuration:
      web:
        internal_link: http
        exported: true
    imported_configuration:
      db:
        internal_link: database
        imported_from: postgres
    resources:
      ram: 512
      cpu: 1
      ephemeral_disk_size: 1024
base_image: jammy
network: private
update_strategy:
  min_ready_seconds: 10
  max_ready_seconds: 600
  max_unavailable_percent: "50%"
"#;
        let spec: DeploymentSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.azs, vec!["z1".to_string(), "z2".to_string()]);
        assert_eq!(spec.containers[0].exported_configuration["web"].internal_link, "http");
        assert_eq!(
            spec.containers[0].imported_configuration["db"].imported_from,
            "postgres"
        );
        assert_eq!(
            spec.update_strategy.max_unavailable_percent.as_deref(),
            Some("50%")
        );
        assert!(spec.update_strategy.strategy_type.is_none());
        assert!(!spec.force_reconciliation);
    }

    #[test]
    fn test_consume_force_flag() {
        let mut record = DeploymentRecord::new(
            "team-a",
            "web",
            DeploymentSpec {
                force_reconciliation: true,
                ..Default::default()
            },
        );
        assert!(record.consume_force_flag());
        assert!(!record.consume_force_flag());
        assert!(!record.spec.force_reconciliation);
    }
}
