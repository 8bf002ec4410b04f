//! Structural validation of records before they enter the store.

use regex::Regex;
use std::sync::LazyLock;

use crate::resource::{
    AnyRecord, BaseImageSpec, CompilationSpec, DeploymentSpec, DirectorSpec, NetworkSpec,
    ReleaseSpec, RoleSpec, TeamSpec, API_VERSION,
};

static RE_DNS_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]{0,61}[a-z0-9])?$").unwrap());

static RE_SHA1: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(sha1:)?[0-9a-fA-F]{40}$").unwrap());

static RE_PERCENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{1,3}%$").unwrap());

/// Whether `value` is an RFC 1123 DNS label.
pub fn is_dns_label(value: &str) -> bool {
    RE_DNS_LABEL.is_match(value)
}

/// Whether `value` is a dot-separated sequence of DNS labels, at most 253 bytes.
pub fn is_dns_subdomain(value: &str) -> bool {
    value.len() <= 253 && value.split('.').all(is_dns_label)
}

/// Collects every problem with a batch of records.
pub struct RecordValidator {
    errors: Vec<String>,
}

impl RecordValidator {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Validates each record. Returns all problems joined with `; `.
    pub fn validate<'a, I>(&mut self, records: I) -> Result<(), String>
    where
        I: IntoIterator<Item = &'a AnyRecord>,
    {
        self.errors.clear();

        for record in records {
            self.validate_record(record);
        }

        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors.join("; "))
        }
    }

    fn validate_record(&mut self, record: &AnyRecord) {
        let label = record.key().to_string();
        let meta = record.metadata();

        if record.api_version() != API_VERSION {
            self.errors.push(format!(
                "{}: apiVersion must be '{}', found '{}'",
                label,
                API_VERSION,
                record.api_version()
            ));
        }
        if !is_dns_label(&meta.namespace) {
            self.errors.push(format!(
                "{}: namespace '{}' is not a valid DNS label",
                label, meta.namespace
            ));
        }
        if !is_dns_subdomain(&meta.name) {
            self.errors
                .push(format!("{}: name '{}' is not a valid DNS name", label, meta.name));
        }

        match record {
            AnyRecord::Director(r) => self.validate_director(&label, &r.spec),
            AnyRecord::Team(r) => self.validate_team(&label, &r.spec),
            AnyRecord::Network(r) => self.validate_network(&label, &r.spec),
            AnyRecord::BaseImage(r) => self.validate_base_image(&label, &r.spec),
            AnyRecord::Release(r) => self.validate_release(&label, &r.spec),
            AnyRecord::Role(r) => self.validate_role(&label, &r.spec),
            AnyRecord::Compilation(r) => self.validate_compilation(&label, &r.spec),
            AnyRecord::Deployment(r) => self.validate_deployment(&label, &r.spec),
            AnyRecord::Az(_) | AnyRecord::VmExtension(_) => {}
        }
    }

    fn require(&mut self, label: &str, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.errors.push(format!("{}: {} is required", label, field));
        }
    }

    fn validate_director(&mut self, label: &str, spec: &DirectorSpec) {
        self.require(label, "url", &spec.url);
        self.require(label, "uaa_url", &spec.uaa_url);
        self.require(label, "uaa_client", &spec.uaa_client);
        self.require(label, "uaa_client_secret", &spec.uaa_client_secret);
    }

    fn validate_team(&mut self, label: &str, spec: &TeamSpec) {
        self.require(label, "director", &spec.director);
    }

    fn validate_network(&mut self, label: &str, spec: &NetworkSpec) {
        if spec.subnets.is_empty() {
            self.errors
                .push(format!("{}: at least one subnet is required", label));
        }
        for (i, subnet) in spec.subnets.iter().enumerate() {
            self.require(label, &format!("subnets[{}].range", i), &subnet.range);
            self.require(label, &format!("subnets[{}].gateway", i), &subnet.gateway);
        }
    }

    fn validate_base_image(&mut self, label: &str, spec: &BaseImageSpec) {
        self.require(label, "baseImageName", &spec.base_image_name);
        self.require(label, "version", &spec.version);
        self.require(label, "url", &spec.url);
        if !spec.sha1.is_empty() && !RE_SHA1.is_match(&spec.sha1) {
            self.errors
                .push(format!("{}: sha1 '{}' is not a SHA-1 digest", label, spec.sha1));
        }
    }

    fn validate_release(&mut self, label: &str, spec: &ReleaseSpec) {
        self.require(label, "releaseName", &spec.release_name);
        self.require(label, "version", &spec.version);
        self.require(label, "url", &spec.url);
        if !spec.sha1.is_empty() && !RE_SHA1.is_match(&spec.sha1) {
            self.errors
                .push(format!("{}: sha1 '{}' is not a SHA-1 digest", label, spec.sha1));
        }
    }

    fn validate_role(&mut self, label: &str, spec: &RoleSpec) {
        self.require(label, "source.release", &spec.source.release);
        self.require(label, "source.job", &spec.source.job);
    }

    fn validate_compilation(&mut self, label: &str, spec: &CompilationSpec) {
        self.require(label, "director", &spec.director);
        self.require(label, "subnet_range", &spec.subnet_range);
        self.require(label, "subnet_gateway", &spec.subnet_gateway);
        if spec.replicas == 0 {
            self.errors
                .push(format!("{}: replicas must be greater than 0", label));
        }
    }

    fn validate_deployment(&mut self, label: &str, spec: &DeploymentSpec) {
        self.require(label, "base_image", &spec.base_image);
        self.require(label, "network", &spec.network);
        if spec.azs.is_empty() {
            self.errors
                .push(format!("{}: at least one AZ is required", label));
        }
        if spec.containers.is_empty() {
            self.errors
                .push(format!("{}: at least one container is required", label));
        }
        for (i, container) in spec.containers.iter().enumerate() {
            self.require(label, &format!("containers[{}].role", i), &container.role);
            for (link, import) in &container.imported_configuration {
                self.require(
                    label,
                    &format!("containers[{}].imported_configuration.{}.imported_from", i, link),
                    &import.imported_from,
                );
            }
        }

        let strategy = &spec.update_strategy;
        if let Some(percent) = strategy.max_unavailable_percent.as_deref() {
            if !percent.is_empty() && !RE_PERCENT.is_match(percent) {
                self.errors.push(format!(
                    "{}: update_strategy.max_unavailable_percent '{}' must look like '25%'",
                    label, percent
                ));
            }
        }
        if strategy.max_ready_seconds > 0 && strategy.max_ready_seconds < strategy.min_ready_seconds {
            self.errors.push(format!(
                "{}: update_strategy.max_ready_seconds must not be less than min_ready_seconds",
                label
            ));
        }
    }
}

impl Default for RecordValidator {
    fn default() -> Self {
        Self::new()
    }
}
