//! Director records: where a Director and its Identity Service live.

use serde::{Deserialize, Serialize};

use super::{AnyRecord, EmptyStatus, KindSpec, Resource, ResourceKind, TeamRecord, TeamSpec};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectorSpec {
    pub url: String,

    /// PEM bundle trusted for the Director's TLS certificate.
    #[serde(default)]
    pub ca_cert: String,

    pub uaa_url: String,

    #[serde(default)]
    pub uaa_ca_cert: String,

    /// Admin client id on the Identity Service.
    pub uaa_client: String,

    /// Name of the secret in the system namespace holding the admin client secret.
    pub uaa_client_secret: String,
}

impl KindSpec for DirectorSpec {
    const KIND: ResourceKind = ResourceKind::Director;
    type Status = EmptyStatus;

    fn wrap(record: Resource<Self, Self::Status>) -> AnyRecord {
        AnyRecord::Director(record)
    }

    fn unwrap(record: AnyRecord) -> Option<Resource<Self, Self::Status>> {
        match record {
            AnyRecord::Director(r) => Some(r),
            _ => None,
        }
    }
}

pub type DirectorRecord = Resource<DirectorSpec, EmptyStatus>;

impl DirectorRecord {
    /// Name of the team created for this Director's own use.
    pub fn team_name(&self) -> String {
        format!("director-{}-team", self.name())
    }

    /// The team record this Director owns, in its own namespace.
    pub fn team(&self) -> TeamRecord {
        TeamRecord::new(
            self.namespace(),
            self.team_name(),
            TeamSpec {
                director: self.name().to_string(),
            },
        )
    }
}
