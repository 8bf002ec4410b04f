//! VM extensions: named cloud properties instance groups can opt into.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::cloud::{cloud_properties_match, CloudProperties};
use super::{AnyRecord, FrozenSpec, FrozenStatus, KindSpec, Record, Resource, ResourceKind};
use crate::error::{ReconcileError, Result};
use crate::reconcile::artifact::DirectorArtifact;
use crate::remote::payload::{CloudConfig, VmExtensionEntry};
use crate::remote::DirectorClient;
use crate::store::RecordLookup;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VmExtensionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_properties: Option<CloudProperties>,
}

impl FrozenSpec for VmExtensionSpec {
    fn matches(&self, other: &Self) -> bool {
        cloud_properties_match(&self.cloud_properties, &other.cloud_properties)
    }
}

impl KindSpec for VmExtensionSpec {
    const KIND: ResourceKind = ResourceKind::VmExtension;
    type Status = FrozenStatus<VmExtensionSpec>;

    fn wrap(record: Resource<Self, Self::Status>) -> AnyRecord {
        AnyRecord::VmExtension(record)
    }

    fn unwrap(record: AnyRecord) -> Option<Resource<Self, Self::Status>> {
        match record {
            AnyRecord::VmExtension(r) => Some(r),
            _ => None,
        }
    }
}

pub type VmExtensionRecord = Resource<VmExtensionSpec, FrozenStatus<VmExtensionSpec>>;

#[async_trait]
impl DirectorArtifact for VmExtensionRecord {
    fn prepare_to_save(&mut self) -> bool {
        self.status.prepare(&self.spec)
    }

    async fn create_unless_exists(
        &mut self,
        director: &dyn DirectorClient,
        _lookup: &dyn RecordLookup,
    ) -> Result<()> {
        let spec = self
            .status
            .original_spec
            .as_ref()
            .ok_or_else(|| ReconcileError::Unfrozen(self.key()))?;
        let config = CloudConfig {
            vm_extensions: vec![VmExtensionEntry {
                name: self.internal_name(),
                cloud_properties: spec.cloud_properties.clone(),
            }],
            ..Default::default()
        };

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
    use crate::remote::RecordingDirector;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_fragment_is_named_after_record() {
        let director = RecordingDirector::new();
        let store = MemoryStore::new();
        let mut record = VmExtensionRecord::new(
            "team-a",
            "public-lb",
            VmExtensionSpec {
                cloud_properties: Some(json!({"elbs": ["web"]}).into()),
            },
        );
        record.prepare_to_save();
        record.create_unless_exists(&director, &store).await.unwrap();

        let config = director.cloud_config("vmextension.team-a.public-lb").unwrap();
        assert_eq!(config.vm_extensions[0].name, "vmextension.team-a.public-lb");
        assert!(config.azs.is_empty());
    }
}
