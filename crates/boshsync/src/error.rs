use thiserror::Error;

use crate::remote::RemoteError;
use crate::resolver::ResolutionError;
use crate::resource::RecordKey;
use crate::secrets::SecretError;
use crate::store::StoreError;

/// Errors surfaced by a single reconcile.
///
/// None of these are retried internally; the caller decides when to re-run.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Reference resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Remote call failed: {0}")]
    Remote(#[from] RemoteError),

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    #[error("Secret error: {0}")]
    Secret(#[from] SecretError),

    #[error("{0} has no frozen spec")]
    Unfrozen(RecordKey),
}

impl ReconcileError {
    /// Returns true if the record was modified concurrently and a re-read should fix it.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ReconcileError::Store(StoreError::Conflict { .. }))
    }

    /// Returns true for scope-binding problems that need a human to fix.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ReconcileError::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
