//! The capability set the engine drives for every Director-backed kind.

use async_trait::async_trait;

use crate::error::Result;
use crate::remote::DirectorClient;
use crate::resource::Record;
use crate::store::RecordLookup;

/// Which credentials a record's Director calls run with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectorScope {
    /// The team bound to this namespace.
    Namespace(String),
    /// The admin client of the named Director record.
    Admin(String),
}

/// A record backed by an object on the Director.
#[async_trait]
pub trait DirectorArtifact: Record {
    /// Freezes the spec on first use, otherwise recomputes the drift warning.
    ///
    /// Returns whether the status changed.
    fn prepare_to_save(&mut self) -> bool;

    fn director_scope(&self) -> DirectorScope {
        DirectorScope::Namespace(self.metadata().namespace.clone())
    }

    /// Makes the remote object exist, built from the frozen spec.
    ///
    /// Sets `available` on success. Safe to call when the object already exists.
    async fn create_unless_exists(
        &mut self,
        director: &dyn DirectorClient,
        lookup: &dyn RecordLookup,
    ) -> Result<()>;

    /// Removes the remote object if it is there.
    async fn delete_if_exists(&self, director: &dyn DirectorClient) -> Result<()>;
}
