//! Base images, known to the Director as stemcells.

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

use super::{AnyRecord, FrozenSpec, FrozenStatus, KindSpec, Record, Resource, ResourceKind};
use crate::error::{ReconcileError, Result};
use crate::reconcile::artifact::DirectorArtifact;
use crate::remote::DirectorClient;
use crate::store::RecordLookup;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseImageSpec {
    #[serde(rename = "baseImageName")]
    pub base_image_name: String,
    pub version: String,
    pub url: String,
    pub sha1: String,
}

impl FrozenSpec for BaseImageSpec {
    fn matches(&self, other: &Self) -> bool {
        self == other
    }
}

impl KindSpec for BaseImageSpec {
    const KIND: ResourceKind = ResourceKind::BaseImage;
    type Status = FrozenStatus<BaseImageSpec>;

    fn wrap(record: Resource<Self, Self::Status>) -> AnyRecord {
        AnyRecord::BaseImage(record)
    }

    fn unwrap(record: AnyRecord) -> Option<Resource<Self, Self::Status>> {
        match record {
            AnyRecord::BaseImage(r) => Some(r),
            _ => None,
        }
    }
}

pub type BaseImageRecord = Resource<BaseImageSpec, FrozenStatus<BaseImageSpec>>;

#[async_trait]
impl DirectorArtifact for BaseImageRecord {
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
            .clone()
            .ok_or_else(|| ReconcileError::Unfrozen(self.key()))?;

        if director
            .has_stemcell(&spec.base_image_name, &spec.version)
            .await?
        {
            debug!(
                "Stemcell {}/{} already uploaded",
                spec.base_image_name, spec.version
            );
        } else {
            director.upload_stemcell(&spec.url, &spec.sha1).await?;
        }
        self.status.available = true;
        Ok(())
    }

    async fn delete_if_exists(&self, director: &dyn DirectorClient) -> Result<()> {
        let Some(spec) = self.status.original_spec.as_ref() else {
            return Ok(());
        };
        if director
            .has_stemcell(&spec.base_image_name, &spec.version)
            .await?
        {
            director
                .delete_stemcell(&spec.base_image_name, &spec.version)
                .await?;
        }
        Ok(())
    }
}
