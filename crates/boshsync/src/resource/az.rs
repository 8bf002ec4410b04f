//! Availability zones.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::cloud::{cloud_properties_match, CloudProperties};
use super::{AnyRecord, FrozenSpec, FrozenStatus, KindSpec, Record, Resource, ResourceKind};
use crate::error::{ReconcileError, Result};
use crate::reconcile::artifact::DirectorArtifact;
use crate::remote::payload::{AzEntry, CloudConfig};
use crate::remote::DirectorClient;
use crate::store::RecordLookup;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AzSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_properties: Option<CloudProperties>,
}

impl FrozenSpec for AzSpec {
    fn matches(&self, other: &Self) -> bool {
        cloud_properties_match(&self.cloud_properties, &other.cloud_properties)
    }
}

impl KindSpec for AzSpec {
    const KIND: ResourceKind = ResourceKind::Az;
    type Status = FrozenStatus<AzSpec>;

    fn wrap(record: Resource<Self, Self::Status>) -> AnyRecord {
        AnyRecord::Az(record)
    }

    fn unwrap(record: AnyRecord) -> Option<Resource<Self, Self::Status>> {
        match record {
            AnyRecord::Az(r) => Some(r),
            _ => None,
        }
    }
}

pub type AzRecord = Resource<AzSpec, FrozenStatus<AzSpec>>;

impl AzRecord {
    /// The cloud-config fragment for this zone, built from the frozen spec.
    pub fn cloud_config(&self) -> Result<CloudConfig> {
        let spec = self
            .status
            .original_spec
            .as_ref()
            .ok_or_else(|| ReconcileError::Unfrozen(self.key()))?;
        Ok(CloudConfig {
            azs: vec![AzEntry {
                name: self.internal_name(),
                cloud_properties: spec.cloud_properties.clone(),
            }],
            ..Default::default()
        })
    }
}

#[async_trait]
impl DirectorArtifact for AzRecord {
    fn prepare_to_save(&mut self) -> bool {
        self.status.prepare(&self.spec)
    }

    async fn create_unless_exists(
        &mut self,
        director: &dyn DirectorClient,
        _lookup: &dyn RecordLookup,
    ) -> Result<()> {
        let config = self.cloud_config()?;
        director
            .update_cloud_config(&self.internal_name(), &config)
            .await?;
        self.status.available = true;
        Ok(())
    }

    async fn delete_if_exists(&self, director: &dyn DirectorClient) -> Result<()> {
        director.delete_cloud_config(&self.internal_name()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cloud_config_uses_frozen_spec() {
        let mut az = AzRecord::new(
            "team-a",
            "z1",
            AzSpec {
                cloud_properties: Some(json!({"zone": "a"}).into()),
            },
        );
        assert!(matches!(az.cloud_config(), Err(ReconcileError::Unfrozen(_))));

        az.prepare_to_save();
        az.spec.cloud_properties = Some(json!({"zone": "b"}).into());
        assert!(az.prepare_to_save());

        let config = az.cloud_config().unwrap();
        assert_eq!(config.azs[0].name, "az.team-a.z1");
        assert_eq!(
            config.azs[0].cloud_properties,
            Some(CloudProperties::new(json!({"zone": "a"})))
        );
    }

    #[test]
    fn test_missing_and_null_properties_match() {
        let a = AzSpec::default();
        let b = AzSpec {
            cloud_properties: Some(serde_json::Value::Null.into()),
        };
        assert!(a.matches(&b));
    }
}
