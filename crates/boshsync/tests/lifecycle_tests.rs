//! Create, drift and delete lifecycle of Director-backed records.

mod common;

use secrecy::ExposeSecret;
use serde_json::json;

use boshsync::error::ReconcileError;
use boshsync::remote::DirectorCall;
use boshsync::resource::{
    AzRecord, BaseImageRecord, CompilationRecord, NetworkRecord, Record, ReleaseRecord,
    ResourceKind, VmExtensionRecord, MUTATION_WARNING,
};
use boshsync::secrets::SecretStore;

use common::*;

#[tokio::test]
async fn test_first_reconcile_freezes_and_publishes() {
    let h = TestHarness::bootstrapped().await;
    let key = h.create(az("z1", "us-east-1a")).await;

    h.reconcile(&key).await.unwrap();

    let stored: AzRecord = h.get(&key).await;
    assert!(stored.has_finalizer());
    assert!(stored.status.available);
    assert!(stored.status.warning.is_empty());
    assert_eq!(stored.status.original_spec.as_ref(), Some(&stored.spec));

    let config = h.director().cloud_config("az.team-a.z1").unwrap();
    assert_eq!(config.azs.len(), 1);
    assert_eq!(config.azs[0].name, "az.team-a.z1");
    assert_eq!(
        config.azs[0].cloud_properties,
        Some(json!({ "zone": "us-east-1a" }).into())
    );
}

#[tokio::test]
async fn test_namespace_records_use_team_credentials() {
    let h = TestHarness::bootstrapped().await;
    let key = h.create(az("z1", "a")).await;

    h.reconcile(&key).await.unwrap();

    let secret = h.secrets.get(SYSTEM_NS, "team.team-a.team").await.unwrap();
    let endpoints = h.factory.director_endpoints();
    assert_eq!(endpoints.len(), 1);
    assert_eq!(endpoints[0].url, director(DIRECTOR).spec.url);
    assert_eq!(endpoints[0].client_id, "team.team-a.team");
    assert_eq!(endpoints[0].client_secret, secret.expose_secret());
}

#[tokio::test]
async fn test_second_reconcile_writes_nothing() {
    let h = TestHarness::bootstrapped().await;
    let key = h.create(az("z1", "a")).await;
    h.reconcile(&key).await.unwrap();
    let before: AzRecord = h.get(&key).await;

    h.reconcile(&key).await.unwrap();

    let after: AzRecord = h.get(&key).await;
    assert_eq!(after.metadata.resource_version, before.metadata.resource_version);
    assert_eq!(after, before);
}

#[tokio::test]
async fn test_mutated_spec_is_ignored_then_warning_clears() {
    let h = TestHarness::bootstrapped().await;
    let key = h.create(az("z1", "a")).await;
    h.reconcile(&key).await.unwrap();

    h.edit::<AzRecord>(&key, |r| {
        r.spec.cloud_properties = Some(json!({ "zone": "b" }).into());
    })
    .await;
    h.reconcile(&key).await.unwrap();

    let stored: AzRecord = h.get(&key).await;
    assert_eq!(stored.status.warning, MUTATION_WARNING);
    assert_eq!(
        stored.status.original_spec.unwrap().cloud_properties,
        Some(json!({ "zone": "a" }).into())
    );
    let config = h.director().cloud_config("az.team-a.z1").unwrap();
    assert_eq!(
        config.azs[0].cloud_properties,
        Some(json!({ "zone": "a" }).into())
    );

    h.edit::<AzRecord>(&key, |r| {
        r.spec.cloud_properties = Some(json!({ "zone": "a" }).into());
    })
    .await;
    h.reconcile(&key).await.unwrap();

    let stored: AzRecord = h.get(&key).await;
    assert!(stored.status.warning.is_empty());
}

#[tokio::test]
async fn test_network_ignores_list_order() {
    let h = TestHarness::bootstrapped().await;
    h.create(az("z1", "a")).await;
    h.create(az("z2", "b")).await;
    let key = h
        .create(network("private", &["z1", "z2"], &["8.8.8.8", "1.1.1.1"]))
        .await;
    h.reconcile(&key).await.unwrap();

    h.edit::<NetworkRecord>(&key, |r| {
        r.spec.subnets[0].dns = vec!["1.1.1.1".into(), "8.8.8.8".into()];
        r.spec.subnets[0].azs = vec!["z2".into(), "z1".into()];
    })
    .await;
    h.reconcile(&key).await.unwrap();
    let stored: NetworkRecord = h.get(&key).await;
    assert!(stored.status.warning.is_empty());

    h.edit::<NetworkRecord>(&key, |r| {
        r.spec.subnets[0].dns.push("9.9.9.9".into());
    })
    .await;
    h.reconcile(&key).await.unwrap();
    let stored: NetworkRecord = h.get(&key).await;
    assert_eq!(stored.status.warning, MUTATION_WARNING);

    let config = h.director().cloud_config("network.team-a.private").unwrap();
    let subnet = &config.networks[0].subnets[0];
    assert_eq!(subnet.dns, vec!["8.8.8.8".to_string(), "1.1.1.1".to_string()]);
    assert_eq!(
        subnet.azs,
        vec!["az.team-a.z1".to_string(), "az.team-a.z2".to_string()]
    );
}

#[tokio::test]
async fn test_network_with_unknown_az_fails() {
    let h = TestHarness::bootstrapped().await;
    let key = h.create(network("private", &["missing"], &[])).await;

    let err = h.reconcile(&key).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Resolution(_)));
    assert!(h.director().cloud_config("network.team-a.private").is_none());
}

#[tokio::test]
async fn test_release_uploads_once() {
    let h = TestHarness::bootstrapped().await;
    let director = h.director();
    director.register_release(&release_url("nginx", "1.0"), "nginx", "1.0");
    let key = h.create(release("nginx", "nginx", "1.0")).await;

    h.reconcile(&key).await.unwrap();
    assert_eq!(
        director.mutations(),
        vec![DirectorCall::UploadRelease {
            url: release_url("nginx", "1.0"),
            sha1: "da39a3ee5e6b4b0d3255bfef95601890afd80709".into(),
        }]
    );
    assert_eq!(director.releases(), vec![("nginx".into(), "1.0".into())]);

    director.clear_calls();
    h.reconcile(&key).await.unwrap();
    assert!(director.mutations().is_empty());
}

#[tokio::test]
async fn test_failed_upload_resumes_on_next_reconcile() {
    let h = TestHarness::bootstrapped().await;
    let key = h.create(release("nginx", "nginx", "1.0")).await;

    let err = h.reconcile(&key).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Remote(_)));

    let stored: ReleaseRecord = h.get(&key).await;
    assert!(stored.has_finalizer());
    assert!(stored.status.original_spec.is_some());
    assert!(!stored.status.available);

    h.director()
        .register_release(&release_url("nginx", "1.0"), "nginx", "1.0");
    h.reconcile(&key).await.unwrap();

    let stored: ReleaseRecord = h.get(&key).await;
    assert!(stored.status.available);
}

#[tokio::test]
async fn test_release_change_is_not_uploaded() {
    let h = TestHarness::bootstrapped().await;
    let director = h.director();
    director.register_release(&release_url("nginx", "1.0"), "nginx", "1.0");
    director.register_release(&release_url("nginx", "2.0"), "nginx", "2.0");
    let key = h.create(release("nginx", "nginx", "1.0")).await;
    h.reconcile(&key).await.unwrap();

    h.edit::<ReleaseRecord>(&key, |r| {
        r.spec.version = "2.0".into();
        r.spec.url = release_url("nginx", "2.0");
    })
    .await;
    director.clear_calls();
    h.reconcile(&key).await.unwrap();

    assert!(director.mutations().is_empty());
    assert_eq!(director.releases(), vec![("nginx".into(), "1.0".into())]);
    let stored: ReleaseRecord = h.get(&key).await;
    assert_eq!(stored.status.warning, MUTATION_WARNING);
}

#[tokio::test]
async fn test_deletion_removes_remote_then_record() {
    let h = TestHarness::bootstrapped().await;
    let director = h.director();
    director.register_stemcell(&stemcell_url("ubuntu-jammy", "1.5"), "ubuntu-jammy", "1.5");
    let key = h.create(base_image("jammy", "ubuntu-jammy", "1.5")).await;
    h.reconcile(&key).await.unwrap();

    h.delete(&key).await;
    assert!(h.exists(&key).await);
    let pending: BaseImageRecord = h.get(&key).await;
    assert!(pending.being_deleted());

    director.clear_calls();
    h.reconcile(&key).await.unwrap();

    assert!(!h.exists(&key).await);
    assert!(director.stemcells().is_empty());
    assert_eq!(
        director.mutations(),
        vec![DirectorCall::DeleteStemcell {
            name: "ubuntu-jammy".into(),
            version: "1.5".into(),
        }]
    );
}

#[tokio::test]
async fn test_failed_remote_delete_keeps_finalizer() {
    let h = TestHarness::bootstrapped().await;
    let key = h.create(vm_extension("large", "m5.xlarge")).await;
    h.reconcile(&key).await.unwrap();
    h.delete(&key).await;

    h.director().fail_with("director unavailable");
    let err = h.reconcile(&key).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Remote(_)));

    let stored: VmExtensionRecord = h.get(&key).await;
    assert!(stored.has_finalizer());
    assert!(stored.being_deleted());

    h.director().recover();
    h.reconcile(&key).await.unwrap();
    assert!(!h.exists(&key).await);
    assert!(h.director().cloud_config("vmextension.team-a.large").is_none());
}

#[tokio::test]
async fn test_deleting_without_finalizer_skips_remote() {
    // No team is bound, so any credential lookup would fail.
    let h = TestHarness::new();
    let mut record = az("z1", "a");
    record.metadata.finalizers.push("other.io/keep".into());
    let key = h.create(record).await;
    h.delete(&key).await;

    h.reconcile(&key).await.unwrap();

    assert!(h.director().calls().is_empty());
    assert!(h.factory.director_endpoints().is_empty());
    let stored: AzRecord = h.get(&key).await;
    assert_eq!(stored.metadata.finalizers, vec!["other.io/keep".to_string()]);
}

#[tokio::test]
async fn test_missing_record_is_reconciled() {
    let h = TestHarness::new();
    let key = az("gone", "a").key();
    h.reconcile(&key).await.unwrap();
}

#[tokio::test]
async fn test_compilation_uses_admin_credentials() {
    let h = TestHarness::bootstrapped().await;
    let key = h.create(compilation("workers", DIRECTOR)).await;

    h.reconcile(&key).await.unwrap();

    let endpoints = h.factory.director_endpoints();
    assert_eq!(endpoints.len(), 1);
    assert_eq!(endpoints[0].client_id, ADMIN_CLIENT);
    assert_eq!(endpoints[0].client_secret, ADMIN_SECRET);

    let config = h
        .director()
        .cloud_config("compilation.bosh-system.workers")
        .unwrap();
    let entry = config.compilation.unwrap();
    assert_eq!(entry.workers, 2);
    assert_eq!(entry.vm_resources.ram, 4096);

    let stored: CompilationRecord = h.get(&key).await;
    assert!(stored.status.available);
}

#[tokio::test]
async fn test_compilation_outside_system_namespace_is_rejected() {
    let h = TestHarness::bootstrapped().await;
    let mut record = compilation("workers", DIRECTOR);
    record.metadata.namespace = TEAM_NS.into();
    let key = h.create(record).await;

    let err = h.reconcile(&key).await.unwrap_err();
    assert!(err.is_configuration());
    assert!(h.director().calls().is_empty());
}

#[tokio::test]
async fn test_internal_names_are_distinct_per_kind() {
    let h = TestHarness::bootstrapped().await;
    let az_key = h.create(az("shared", "a")).await;
    let ext_key = h.create(vm_extension("shared", "m5.large")).await;

    h.reconcile(&az_key).await.unwrap();
    h.reconcile(&ext_key).await.unwrap();

    assert_eq!(
        h.director().cloud_config_names(),
        vec![
            "az.team-a.shared".to_string(),
            "vmextension.team-a.shared".to_string()
        ]
    );
    assert_eq!(az_key.kind, ResourceKind::Az);
}
