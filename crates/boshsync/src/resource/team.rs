//! Teams: a namespace's credentials on one Director.

use log::debug;
use serde::{Deserialize, Serialize};

use super::{track_drift, AnyRecord, FrozenSpec, KindSpec, Record, Resource, ResourceKind};
use crate::remote::{IdentityClient, Result, TEAM_AUTHORITIES};
use secrecy::SecretString;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamSpec {
    /// Name of a Director record in the system namespace.
    pub director: String,
}

impl FrozenSpec for TeamSpec {
    fn matches(&self, other: &Self) -> bool {
        self == other
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamStatus {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub warning: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_spec: Option<TeamSpec>,

    /// Namespace the client secret was stored in, fixed at freeze time.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secret_namespace: String,

    #[serde(default)]
    pub available: bool,
}

impl TeamStatus {
    /// Freezes the spec on first use, otherwise re-checks drift.
    ///
    /// The secret namespace is recorded once, the first time it is missing.
    pub fn prepare(&mut self, spec: &TeamSpec, secret_namespace: &str) -> bool {
        let mut changed = false;
        if self.secret_namespace.is_empty() && !secret_namespace.is_empty() {
            self.secret_namespace = secret_namespace.to_string();
            changed = true;
        }
        track_drift(spec, &mut self.original_spec, &mut self.warning) || changed
    }
}

impl KindSpec for TeamSpec {
    const KIND: ResourceKind = ResourceKind::Team;
    type Status = TeamStatus;

    fn wrap(record: Resource<Self, Self::Status>) -> AnyRecord {
        AnyRecord::Team(record)
    }

    fn unwrap(record: AnyRecord) -> Option<Resource<Self, Self::Status>> {
        match record {
            AnyRecord::Team(r) => Some(r),
            _ => None,
        }
    }
}

pub type TeamRecord = Resource<TeamSpec, TeamStatus>;

impl TeamRecord {
    pub fn prepare_to_save(&mut self, secret_namespace: &str) -> bool {
        self.status.prepare(&self.spec, secret_namespace)
    }

    /// Client id on the Identity Service.
    pub fn client_name(&self) -> String {
        self.internal_name()
    }

    pub fn secret_name(&self) -> String {
        self.internal_name()
    }

    pub fn secret_namespace(&self) -> &str {
        &self.status.secret_namespace
    }

    /// The Director captured at freeze time.
    pub fn original_director(&self) -> Option<&str> {
        self.status.original_spec.as_ref().map(|s| s.director.as_str())
    }

    /// Creates the team's identity client unless it already exists.
    pub async fn create_unless_exists(
        &mut self,
        identity: &dyn IdentityClient,
        secret: &SecretString,
    ) -> Result<()> {
        let client = self.client_name();
        if identity.has_client(&client).await? {
            debug!("Identity client '{}' already exists", client);
        } else {
            identity
                .create_client(&client, secret, TEAM_AUTHORITIES)
                .await?;
        }
        self.status.available = true;
        Ok(())
    }

    pub async fn delete_if_exists(&self, identity: &dyn IdentityClient) -> Result<()> {
        let client = self.client_name();
        if identity.has_client(&client).await? {
            identity.delete_client(&client).await?;
        }
        Ok(())
    }
}
