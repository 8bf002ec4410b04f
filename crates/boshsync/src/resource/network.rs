//! Networks and their subnets.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::cloud::{cloud_properties_match, same_members, CloudProperties};
use super::{
    AnyRecord, AzRecord, FrozenSpec, FrozenStatus, KindSpec, Record, Resource, ResourceKind,
};
use crate::error::{ReconcileError, Result};
use crate::reconcile::artifact::DirectorArtifact;
use crate::remote::payload::{CloudConfig, NetworkEntry, SubnetEntry};
use crate::remote::DirectorClient;
use crate::resolver::resolve_internal_name;
use crate::store::RecordLookup;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    #[serde(rename = "type", default = "default_network_type")]
    pub network_type: String,

    #[serde(default)]
    pub subnets: Vec<Subnet>,
}

fn default_network_type() -> String {
    "manual".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subnet {
    pub range: String,
    pub gateway: String,

    #[serde(default)]
    pub dns: Vec<String>,

    #[serde(default)]
    pub reserved: Vec<String>,

    #[serde(rename = "static", default)]
    pub static_ips: Vec<String>,

    /// Names of AZ records in the same namespace.
    #[serde(default)]
    pub azs: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_properties: Option<CloudProperties>,
}

impl Subnet {
    /// Address lists and zone membership are unordered.
    fn matches(&self, other: &Self) -> bool {
        self.range == other.range
            && self.gateway == other.gateway
            && same_members(&self.dns, &other.dns)
            && same_members(&self.reserved, &other.reserved)
            && same_members(&self.static_ips, &other.static_ips)
            && same_members(&self.azs, &other.azs)
            && cloud_properties_match(&self.cloud_properties, &other.cloud_properties)
    }
}

impl FrozenSpec for NetworkSpec {
    fn matches(&self, other: &Self) -> bool {
        self.network_type == other.network_type
            && self.subnets.len() == other.subnets.len()
            && self
                .subnets
                .iter()
                .zip(&other.subnets)
                .all(|(a, b)| a.matches(b))
    }
}

impl KindSpec for NetworkSpec {
    const KIND: ResourceKind = ResourceKind::Network;
    type Status = FrozenStatus<NetworkSpec>;

    fn wrap(record: Resource<Self, Self::Status>) -> AnyRecord {
        AnyRecord::Network(record)
    }

    fn unwrap(record: AnyRecord) -> Option<Resource<Self, Self::Status>> {
        match record {
            AnyRecord::Network(r) => Some(r),
            _ => None,
        }
    }
}

pub type NetworkRecord = Resource<NetworkSpec, FrozenStatus<NetworkSpec>>;

impl NetworkRecord {
    /// Builds the network's cloud-config fragment, resolving subnet AZs to their remote names.
    pub async fn cloud_config(&self, lookup: &dyn RecordLookup) -> Result<CloudConfig> {
        let spec = self
            .status
            .original_spec
            .as_ref()
            .ok_or_else(|| ReconcileError::Unfrozen(self.key()))?;

        let mut subnets = Vec::with_capacity(spec.subnets.len());
        for subnet in &spec.subnets {
            let mut azs = Vec::with_capacity(subnet.azs.len());
            for az in &subnet.azs {
                azs.push(resolve_internal_name::<AzRecord>(lookup, self.namespace(), az).await?);
            }
            subnets.push(SubnetEntry {
                range: subnet.range.clone(),
                gateway: subnet.gateway.clone(),
                dns: subnet.dns.clone(),
                reserved: subnet.reserved.clone(),
                static_ips: subnet.static_ips.clone(),
                azs,
                cloud_properties: subnet.cloud_properties.clone(),
            });
        }

        Ok(CloudConfig {
            networks: vec![NetworkEntry {
                name: self.internal_name(),
                network_type: spec.network_type.clone(),
                subnets,
            }],
            ..Default::default()
        })
    }
}

#[async_trait]
impl DirectorArtifact for NetworkRecord {
    fn prepare_to_save(&mut self) -> bool {
        self.status.prepare(&self.spec)
    }

    async fn create_unless_exists(
        &mut self,
        director: &dyn DirectorClient,
        lookup: &dyn RecordLookup,
    ) -> Result<()> {
        let config = self.cloud_config(lookup).await?;
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
