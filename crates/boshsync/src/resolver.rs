//! Builds a deployment manifest from a Deployment record and the records it names.
//!
//! Every reference is looked up fresh on each call; nothing is cached. Any
//! missing or not-yet-reconciled collaborator aborts the whole manifest, so a
//! partial manifest is never produced.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use thiserror::Error;

use crate::remote::payload::{
    ConsumesLink, DeploymentManifest, InstanceGroup, Job, MaxInFlight, NetworkRef, ProvidesLink,
    ReleaseRef, StemcellRef, UpdatePolicy, VmResources, WatchTime, STEMCELL_ALIAS,
};
use crate::resource::{
    AzRecord, BaseImageRecord, Container, DeploymentRecord, NetworkRecord, Record, RecordKey,
    ReleaseRecord, RoleRecord, UpdateStrategy, VmExtensionRecord,
};
use crate::store::{get_record, RecordLookup, StoreError};

/// VM update strategy used when a deployment names none.
pub const DEFAULT_VM_STRATEGY: &str = "delete-create";

/// Instances updated at once when neither a percentage nor a count is given.
pub const DEFAULT_MAX_IN_FLIGHT: u32 = 1;

/// Errors from resolving a deployment's references.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolutionError {
    #[error("{0} does not exist")]
    Missing(RecordKey),

    #[error("{key} is not ready: {reason}")]
    Incomplete { key: RecordKey, reason: String },

    #[error("{key} is invalid: {reason}")]
    Invalid { key: RecordKey, reason: String },

    #[error(transparent)]
    Store(StoreError),
}

impl ResolutionError {
    /// Returns true when the collaborator may still appear or become ready.
    pub fn is_retryable(&self) -> bool {
        match self {
            ResolutionError::Missing(_) | ResolutionError::Incomplete { .. } => true,
            ResolutionError::Invalid { .. } => false,
            ResolutionError::Store(e) => e.is_retryable(),
        }
    }
}

impl From<StoreError> for ResolutionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => ResolutionError::Missing(key),
            other => ResolutionError::Store(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ResolutionError>;

async fn fetch<T: Record>(lookup: &dyn RecordLookup, namespace: &str, name: &str) -> Result<T> {
    Ok(get_record::<T>(lookup, namespace, name).await?)
}

/// Returns the remote name of the `T` record `namespace/name`, failing if it does not exist.
pub async fn resolve_internal_name<T: Record>(
    lookup: &dyn RecordLookup,
    namespace: &str,
    name: &str,
) -> Result<String> {
    let record: T = fetch(lookup, namespace, name).await?;
    Ok(record.internal_name())
}

/// Sums the containers' requests into the instance group's footprint.
///
/// Returns the VM resources and the persistent disk size, or `None` if a sum overflows.
pub fn aggregate_resources(containers: &[Container]) -> Option<(VmResources, u64)> {
    containers.iter().try_fold(
        (VmResources::default(), 0u64),
        |(vm, persistent), container| {
            let r = &container.resources;
            Some((
                VmResources {
                    cpu: vm.cpu.checked_add(r.cpu)?,
                    ram: vm.ram.checked_add(r.ram)?,
                    ephemeral_disk_size: vm
                        .ephemeral_disk_size
                        .checked_add(r.ephemeral_disk_size)?,
                },
                persistent.checked_add(r.persistent_disk_size)?,
            ))
        },
    )
}

/// Builds the update block from a deployment's update strategy.
///
/// Returns `None` when the readiness bounds do not fit in milliseconds.
pub fn update_policy(strategy: &UpdateStrategy) -> Option<UpdatePolicy> {
    let max_in_flight = match strategy
        .max_unavailable_percent
        .as_deref()
        .filter(|p| !p.is_empty())
    {
        Some(percent) => MaxInFlight::Percent(percent.to_string()),
        None => MaxInFlight::Instances(
            strategy
                .max_unavailable_replicas
                .unwrap_or(DEFAULT_MAX_IN_FLIGHT),
        ),
    };
    let watch_time =
        WatchTime::from_seconds(strategy.min_ready_seconds, strategy.max_ready_seconds)?;

    Some(UpdatePolicy {
        canaries: 0,
        max_in_flight,
        canary_watch_time: watch_time,
        update_watch_time: watch_time,
        serial: false,
        vm_strategy: strategy
            .strategy_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_VM_STRATEGY)
            .to_string(),
    })
}

/// Resolves a Deployment record's references into a manifest.
pub struct DeploymentResolver<'a> {
    lookup: &'a dyn RecordLookup,
}

impl<'a> DeploymentResolver<'a> {
    pub fn new(lookup: &'a dyn RecordLookup) -> Self {
        Self { lookup }
    }

    pub async fn resolve(&self, deployment: &DeploymentRecord) -> Result<DeploymentManifest> {
        let namespace = deployment.namespace();
        let spec = &deployment.spec;
        let name = deployment.internal_name();

        let mut releases = BTreeSet::new();
        let mut jobs = Vec::with_capacity(spec.containers.len());
        for container in &spec.containers {
            let (release, job) = self.resolve_container(namespace, container).await?;
            releases.insert(release);
            jobs.push(job);
        }

        let stemcell = self.resolve_stemcell(namespace, &spec.base_image).await?;

        let mut azs = Vec::with_capacity(spec.azs.len());
        for az in &spec.azs {
            azs.push(resolve_internal_name::<AzRecord>(self.lookup, namespace, az).await?);
        }

        let mut vm_extensions = Vec::with_capacity(spec.extensions.len());
        for extension in &spec.extensions {
            vm_extensions.push(
                resolve_internal_name::<VmExtensionRecord>(self.lookup, namespace, extension)
                    .await?,
            );
        }

        let network =
            resolve_internal_name::<NetworkRecord>(self.lookup, namespace, &spec.network).await?;

        let invalid = |reason: &str| ResolutionError::Invalid {
            key: deployment.key(),
            reason: reason.to_string(),
        };
        let (vm_resources, persistent_disk_size) = aggregate_resources(&spec.containers)
            .ok_or_else(|| invalid("summed container resources overflow"))?;
        let update = update_policy(&spec.update_strategy)
            .ok_or_else(|| invalid("update_strategy ready seconds overflow in milliseconds"))?;

        debug!(
            "Resolved {} with {} release(s) and {} job(s)",
            deployment.key(),
            releases.len(),
            jobs.len()
        );

        Ok(DeploymentManifest {
            name: name.clone(),
            releases: releases.into_iter().collect(),
            stemcells: vec![stemcell],
            update,
            instance_groups: vec![InstanceGroup {
                name,
                azs,
                instances: spec.replicas,
                jobs,
                vm_extensions,
                vm_resources,
                stemcell: STEMCELL_ALIAS.to_string(),
                persistent_disk_size,
                networks: vec![NetworkRef { name: network }],
            }],
        })
    }

    /// Looks up a container's role and release and builds its job.
    async fn resolve_container(
        &self,
        namespace: &str,
        container: &Container,
    ) -> Result<(ReleaseRef, Job)> {
        let role: RoleRecord = fetch(self.lookup, namespace, &container.role).await?;
        let release: ReleaseRecord =
            fetch(self.lookup, namespace, &role.spec.source.release).await?;
        let frozen = release
            .status
            .original_spec
            .as_ref()
            .ok_or_else(|| ResolutionError::Incomplete {
                key: release.key(),
                reason: "release has not been reconciled yet".to_string(),
            })?;

        let mut consumes = BTreeMap::new();
        for (external, import) in &container.imported_configuration {
            let upstream = resolve_internal_name::<DeploymentRecord>(
                self.lookup,
                namespace,
                &import.imported_from,
            )
            .await?;
            consumes.insert(
                import.internal_link.clone(),
                ConsumesLink {
                    from: external.clone(),
                    deployment: upstream,
                },
            );
        }

        let provides = container
            .exported_configuration
            .iter()
            .map(|(external, export)| {
                (
                    export.internal_link.clone(),
                    ProvidesLink {
                        alias: external.clone(),
                        shared: export.exported,
                    },
                )
            })
            .collect();

        let release_ref = ReleaseRef {
            name: frozen.release_name.clone(),
            version: frozen.version.clone(),
        };
        let job = Job {
            name: role.spec.source.job.clone(),
            release: frozen.release_name.clone(),
            consumes,
            provides,
            properties: role.spec.properties.clone(),
        };
        Ok((release_ref, job))
    }

    async fn resolve_stemcell(&self, namespace: &str, base_image: &str) -> Result<StemcellRef> {
        let image: BaseImageRecord = fetch(self.lookup, namespace, base_image).await?;
        let frozen = image
            .status
            .original_spec
            .as_ref()
            .ok_or_else(|| ResolutionError::Incomplete {
                key: image.key(),
                reason: "base image has not been reconciled yet".to_string(),
            })?;
        Ok(StemcellRef {
            alias: STEMCELL_ALIAS.to_string(),
            name: frozen.base_image_name.clone(),
            version: frozen.version.clone(),
        })
    }
}
