//! Builders for test records.
//!
//! Every record is created in the namespaces the harness binds to a team,
//! so builders only take the names that vary between tests.

#![allow(dead_code)]

use serde_json::json;

use boshsync::resource::{
    AzRecord, AzSpec, BaseImageRecord, BaseImageSpec, CompilationRecord, CompilationSpec,
    Container, DeploymentRecord, DeploymentSpec, DirectorRecord, DirectorSpec,
    ExportedConfiguration, ImportedConfiguration, NetworkRecord, NetworkSpec, ReleaseRecord,
    ReleaseSpec, RoleRecord, RoleSource, RoleSpec, Subnet, TeamRecord, TeamSpec,
    VmExtensionRecord, VmExtensionSpec,
};

pub const SYSTEM_NS: &str = "bosh-system";
pub const TEAM_NS: &str = "team-a";
pub const DIRECTOR: &str = "main";
pub const ADMIN_CLIENT: &str = "admin";
pub const ADMIN_SECRET_NAME: &str = "uaa-admin";
pub const ADMIN_SECRET: &str = "admin-secret";

const SHA1: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";

pub fn director(name: &str) -> DirectorRecord {
    DirectorRecord::new(
        SYSTEM_NS,
        name,
        DirectorSpec {
            url: format!("https://{}.director.example.com:25555", name),
            ca_cert: String::new(),
            uaa_url: format!("https://{}.director.example.com:8443", name),
            uaa_ca_cert: String::new(),
            uaa_client: ADMIN_CLIENT.to_string(),
            uaa_client_secret: ADMIN_SECRET_NAME.to_string(),
        },
    )
}

pub fn team(namespace: &str, name: &str, director: &str) -> TeamRecord {
    TeamRecord::new(
        namespace,
        name,
        TeamSpec {
            director: director.to_string(),
        },
    )
}

pub fn az(name: &str, zone: &str) -> AzRecord {
    AzRecord::new(
        TEAM_NS,
        name,
        AzSpec {
            cloud_properties: Some(json!({ "zone": zone }).into()),
        },
    )
}

pub fn network(name: &str, azs: &[&str], dns: &[&str]) -> NetworkRecord {
    NetworkRecord::new(
        TEAM_NS,
        name,
        NetworkSpec {
            network_type: "manual".to_string(),
            subnets: vec![Subnet {
                range: "10.0.0.0/24".to_string(),
                gateway: "10.0.0.1".to_string(),
                dns: dns.iter().map(|s| s.to_string()).collect(),
                reserved: vec!["10.0.0.2-10.0.0.10".to_string()],
                azs: azs.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            }],
        },
    )
}

pub fn release_url(release_name: &str, version: &str) -> String {
    format!("https://releases.example.com/{}-{}.tgz", release_name, version)
}

pub fn release(name: &str, release_name: &str, version: &str) -> ReleaseRecord {
    ReleaseRecord::new(
        TEAM_NS,
        name,
        ReleaseSpec {
            release_name: release_name.to_string(),
            version: version.to_string(),
            url: release_url(release_name, version),
            sha1: SHA1.to_string(),
        },
    )
}

pub fn stemcell_url(image_name: &str, version: &str) -> String {
    format!("https://stemcells.example.com/{}-{}.tgz", image_name, version)
}

pub fn base_image(name: &str, image_name: &str, version: &str) -> BaseImageRecord {
    BaseImageRecord::new(
        TEAM_NS,
        name,
        BaseImageSpec {
            base_image_name: image_name.to_string(),
            version: version.to_string(),
            url: stemcell_url(image_name, version),
            sha1: SHA1.to_string(),
        },
    )
}

pub fn vm_extension(name: &str, instance_type: &str) -> VmExtensionRecord {
    VmExtensionRecord::new(
        TEAM_NS,
        name,
        VmExtensionSpec {
            cloud_properties: Some(json!({ "instance_type": instance_type }).into()),
        },
    )
}

pub fn role(name: &str, release: &str, job: &str) -> RoleRecord {
    RoleRecord::new(
        TEAM_NS,
        name,
        RoleSpec {
            source: RoleSource {
                release: release.to_string(),
                job: job.to_string(),
            },
            properties: json!({ "port": 8080 }),
        },
    )
}

pub fn compilation(name: &str, director: &str) -> CompilationRecord {
    CompilationRecord::new(
        SYSTEM_NS,
        name,
        CompilationSpec {
            replicas: 2,
            cpu: 2,
            ram: 4096,
            ephemeral_disk_size: 10240,
            network_type: "manual".to_string(),
            subnet_range: "10.1.0.0/24".to_string(),
            subnet_gateway: "10.1.0.1".to_string(),
            subnet_dns: vec!["8.8.8.8".to_string()],
            director: director.to_string(),
            ..Default::default()
        },
    )
}

/// Builder for Deployment records.
pub struct DeploymentBuilder {
    spec: DeploymentSpec,
}

impl DeploymentBuilder {
    pub fn new() -> Self {
        Self {
            spec: DeploymentSpec {
                replicas: 1,
                base_image: "jammy".to_string(),
                network: "private".to_string(),
                ..Default::default()
            },
        }
    }

    pub fn az(mut self, name: &str) -> Self {
        self.spec.azs.push(name.to_string());
        self
    }

    pub fn replicas(mut self, replicas: u32) -> Self {
        self.spec.replicas = replicas;
        self
    }

    pub fn extension(mut self, name: &str) -> Self {
        self.spec.extensions.push(name.to_string());
        self
    }

    /// Adds a container running `role` with a fixed resource request.
    pub fn container(mut self, role: &str) -> Self {
        let mut container = Container {
            role: role.to_string(),
            ..Default::default()
        };
        container.resources.cpu = 1;
        container.resources.ram = 512;
        container.resources.ephemeral_disk_size = 1024;
        self.spec.containers.push(container);
        self
    }

    /// Exports `internal_link` of the last container as `external`.
    pub fn export(mut self, external: &str, internal_link: &str) -> Self {
        if let Some(container) = self.spec.containers.last_mut() {
            container.exported_configuration.insert(
                external.to_string(),
                ExportedConfiguration {
                    internal_link: internal_link.to_string(),
                    exported: true,
                },
            );
        }
        self
    }

    /// Imports `external` from deployment `from` into the last container's `internal_link`.
    pub fn import(mut self, external: &str, internal_link: &str, from: &str) -> Self {
        if let Some(container) = self.spec.containers.last_mut() {
            container.imported_configuration.insert(
                external.to_string(),
                ImportedConfiguration {
                    internal_link: internal_link.to_string(),
                    imported_from: from.to_string(),
                },
            );
        }
        self
    }

    pub fn spec(&self) -> &DeploymentSpec {
        &self.spec
    }

    pub fn build(self, name: &str) -> DeploymentRecord {
        DeploymentRecord::new(TEAM_NS, name, self.spec)
    }
}

impl Default for DeploymentBuilder {
    fn default() -> Self {
        Self::new()
    }
}
