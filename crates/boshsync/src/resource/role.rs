//! Roles: a job from a release plus its properties. Reference data only.

use serde::{Deserialize, Serialize};

use super::{AnyRecord, EmptyStatus, KindSpec, Resource, ResourceKind};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleSpec {
    pub source: RoleSource,

    /// Job properties, passed to the Director as-is.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub properties: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSource {
    /// Name of a Release record in the same namespace.
    pub release: String,
    /// Job name within that release.
    pub job: String,
}

impl KindSpec for RoleSpec {
    const KIND: ResourceKind = ResourceKind::Role;
    type Status = EmptyStatus;

    fn wrap(record: Resource<Self, Self::Status>) -> AnyRecord {
        AnyRecord::Role(record)
    }

    fn unwrap(record: AnyRecord) -> Option<Resource<Self, Self::Status>> {
        match record {
            AnyRecord::Role(r) => Some(r),
            _ => None,
        }
    }
}

pub type RoleRecord = Resource<RoleSpec, EmptyStatus>;
