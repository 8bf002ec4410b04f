//! Compilation workers for a Director.
//!
//! A compilation record owns a private AZ and a single-subnet network, both
//! named after the record, and the `compilation` block that points at them.
//! It lives in the system namespace and talks to its Director as admin.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::cloud::{cloud_properties_match, same_members, CloudProperties};
use super::{AnyRecord, FrozenSpec, FrozenStatus, KindSpec, Record, Resource, ResourceKind};
use crate::error::{ReconcileError, Result};
use crate::reconcile::artifact::{DirectorArtifact, DirectorScope};
use crate::remote::payload::{
    AzEntry, CloudConfig, CompilationEntry, NetworkEntry, SubnetEntry, VmResources,
};
use crate::remote::DirectorClient;
use crate::store::RecordLookup;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompilationSpec {
    pub replicas: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub az_cloud_properties: Option<CloudProperties>,

    pub cpu: u64,
    pub ram: u64,
    pub ephemeral_disk_size: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_properties: Option<CloudProperties>,

    pub network_type: String,
    pub subnet_range: String,
    pub subnet_gateway: String,

    #[serde(default)]
    pub subnet_dns: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subnet_reserved: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_cloud_properties: Option<CloudProperties>,

    /// Name of the Director record the workers belong to.
    pub director: String,
}

impl FrozenSpec for CompilationSpec {
    fn matches(&self, other: &Self) -> bool {
        self.replicas == other.replicas
            && self.cpu == other.cpu
            && self.ram == other.ram
            && self.ephemeral_disk_size == other.ephemeral_disk_size
            && self.network_type == other.network_type
            && self.subnet_range == other.subnet_range
            && self.subnet_gateway == other.subnet_gateway
            && self.director == other.director
            && same_members(&self.subnet_dns, &other.subnet_dns)
            && same_members(&self.subnet_reserved, &other.subnet_reserved)
            && cloud_properties_match(&self.az_cloud_properties, &other.az_cloud_properties)
            && cloud_properties_match(&self.cloud_properties, &other.cloud_properties)
            && cloud_properties_match(
                &self.subnet_cloud_properties,
                &other.subnet_cloud_properties,
            )
    }
}

impl KindSpec for CompilationSpec {
    const KIND: ResourceKind = ResourceKind::Compilation;
    type Status = FrozenStatus<CompilationSpec>;

    fn wrap(record: Resource<Self, Self::Status>) -> AnyRecord {
        AnyRecord::Compilation(record)
    }

    fn unwrap(record: AnyRecord) -> Option<Resource<Self, Self::Status>> {
        match record {
            AnyRecord::Compilation(r) => Some(r),
            _ => None,
        }
    }
}

pub type CompilationRecord = Resource<CompilationSpec, FrozenStatus<CompilationSpec>>;

impl CompilationRecord {
    fn frozen(&self) -> Result<&CompilationSpec> {
        self.status
            .original_spec
            .as_ref()
            .ok_or_else(|| ReconcileError::Unfrozen(self.key()))
    }

    /// The cloud-config fragment for the workers, built from the frozen spec.
    pub fn cloud_config(&self) -> Result<CloudConfig> {
        let spec = self.frozen()?;
        let name = self.internal_name();

        Ok(CloudConfig {
            azs: vec![AzEntry {
                name: name.clone(),
                cloud_properties: spec.az_cloud_properties.clone(),
            }],
            networks: vec![NetworkEntry {
                name: name.clone(),
                network_type: spec.network_type.clone(),
                subnets: vec![SubnetEntry {
                    range: spec.subnet_range.clone(),
                    gateway: spec.subnet_gateway.clone(),
                    dns: spec.subnet_dns.clone(),
                    reserved: spec.subnet_reserved.clone(),
                    static_ips: Vec::new(),
                    azs: vec![name.clone()],
                    cloud_properties: spec.subnet_cloud_properties.clone(),
                }],
            }],
            compilation: Some(CompilationEntry {
                workers: spec.replicas,
                az: name.clone(),
                orphan_workers: true,
                vm_resources: VmResources {
                    cpu: spec.cpu,
                    ram: spec.ram,
                    ephemeral_disk_size: spec.ephemeral_disk_size,
                },
                cloud_properties: spec.cloud_properties.clone(),
                network: name,
                reuse_compilation_vms: true,
            }),
            ..Default::default()
        })
    }
}

#[async_trait]
impl DirectorArtifact for CompilationRecord {
    fn prepare_to_save(&mut self) -> bool {
        self.status.prepare(&self.spec)
    }

    /// Always the Director captured at freeze time, so a drifted spec cannot
    /// move the workers to another Director.
    fn director_scope(&self) -> DirectorScope {
        let director = self
            .status
            .original_spec
            .as_ref()
            .map_or(&self.spec.director, |s| &s.director);
        DirectorScope::Admin(director.clone())
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
