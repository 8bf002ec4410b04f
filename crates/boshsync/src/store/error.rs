//! Record store error types.

use thiserror::Error;

use crate::resource::{RecordKey, ResourceKind};

/// Errors returned by a record store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(RecordKey),

    #[error("Record already exists: {0}")]
    AlreadyExists(RecordKey),

    #[error("Conflict writing {key}: expected version {expected}, found {found}")]
    Conflict {
        key: RecordKey,
        expected: u64,
        found: u64,
    },

    #[error("Record {key} is a {found}, expected a {expected}")]
    KindMismatch {
        key: RecordKey,
        expected: ResourceKind,
        found: ResourceKind,
    },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists(_))
    }

    /// Returns true if re-reading and retrying the write may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Maps a not-found error to `Ok(())`.
pub fn ignore_not_found(result: Result<()>) -> Result<()> {
    match result {
        Err(StoreError::NotFound(_)) => Ok(()),
        other => other,
    }
}

/// Maps an already-exists error to `Ok(())`.
pub fn ignore_already_exists<T>(result: Result<T>) -> Result<()> {
    match result {
        Ok(_) | Err(StoreError::AlreadyExists(_)) => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> RecordKey {
        RecordKey::new(ResourceKind::Team, "bosh-system", "director-vbox-team")
    }

    #[test]
    fn test_ignore_helpers() {
        assert!(ignore_not_found(Err(StoreError::NotFound(key()))).is_ok());
        assert!(ignore_not_found(Err(StoreError::LockPoisoned)).is_err());
        assert!(ignore_already_exists::<()>(Err(StoreError::AlreadyExists(key()))).is_ok());
        assert!(ignore_already_exists::<()>(Err(StoreError::NotFound(key()))).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            StoreError::NotFound(key()).to_string(),
            "Record not found: Team bosh-system/director-vbox-team"
        );
    }
}
