//! Software releases uploaded to the Director.

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

use super::{AnyRecord, FrozenSpec, FrozenStatus, KindSpec, Record, Resource, ResourceKind};
use crate::error::{ReconcileError, Result};
use crate::reconcile::artifact::DirectorArtifact;
use crate::remote::DirectorClient;
use crate::store::RecordLookup;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseSpec {
    #[serde(rename = "releaseName")]
    pub release_name: String,
    pub version: String,
    pub url: String,
    pub sha1: String,
}

impl FrozenSpec for ReleaseSpec {
    fn matches(&self, other: &Self) -> bool {
        self == other
    }
}

impl KindSpec for ReleaseSpec {
    const KIND: ResourceKind = ResourceKind::Release;
    type Status = FrozenStatus<ReleaseSpec>;

    fn wrap(record: Resource<Self, Self::Status>) -> AnyRecord {
        AnyRecord::Release(record)
    }

    fn unwrap(record: AnyRecord) -> Option<Resource<Self, Self::Status>> {
        match record {
            AnyRecord::Release(r) => Some(r),
            _ => None,
        }
    }
}

pub type ReleaseRecord = Resource<ReleaseSpec, FrozenStatus<ReleaseSpec>>;

#[async_trait]
impl DirectorArtifact for ReleaseRecord {
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

        if director.has_release(&spec.release_name, &spec.version).await? {
            debug!("Release {}/{} already uploaded", spec.release_name, spec.version);
        } else {
            director.upload_release(&spec.url, &spec.sha1).await?;
        }
        self.status.available = true;
        Ok(())
    }

    async fn delete_if_exists(&self, director: &dyn DirectorClient) -> Result<()> {
        // Nothing was ever uploaded without a frozen spec.
        let Some(spec) = self.status.original_spec.as_ref() else {
            return Ok(());
        };
        if director.has_release(&spec.release_name, &spec.version).await? {
            director
                .delete_release(&spec.release_name, &spec.version)
                .await?;
        }
        Ok(())
    }
}
