//! Opaque cloud-provider property blobs and set comparison helpers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Cloud-provider specific properties, passed through to the Director untouched.
///
/// Two blobs are equal when their canonical serialized forms are equal, so key
/// order in the source manifest never matters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CloudProperties(pub serde_json::Value);

impl CloudProperties {
    /// Wraps a JSON value.
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Returns the wrapped JSON value.
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Returns the canonical text form: object keys sorted, no whitespace.
    pub fn canonical(&self) -> String {
        // serde_json's Map is ordered by key, so plain serialization is canonical.
        serde_json::to_string(&self.0).unwrap_or_default()
    }
}

impl PartialEq for CloudProperties {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl From<serde_json::Value> for CloudProperties {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Compares two optional blobs, treating a missing blob as JSON `null`.
pub fn cloud_properties_match(a: &Option<CloudProperties>, b: &Option<CloudProperties>) -> bool {
    let canonical = |p: &Option<CloudProperties>| {
        p.as_ref()
            .map(CloudProperties::canonical)
            .unwrap_or_else(|| "null".to_string())
    };
    canonical(a) == canonical(b)
}

/// Compares two lists as sets: order and repetition are ignored.
pub fn same_members(a: &[String], b: &[String]) -> bool {
    let left: BTreeSet<&str> = a.iter().map(String::as_str).collect();
    let right: BTreeSet<&str> = b.iter().map(String::as_str).collect();
    left == right
}
