//! Teams and Directors: records reconciled against the Identity Service and the store.

use log::{debug, info};

use super::Reconciler;
use crate::error::{ReconcileError, Result};
use crate::resource::{DirectorRecord, Record, TeamRecord};
use crate::secrets::get_or_generate;
use crate::store::{ignore_already_exists, ignore_not_found, StoreError};

impl Reconciler {
    pub(super) async fn reconcile_team(&self, mut team: TeamRecord) -> Result<()> {
        if team.being_deleted() {
            if !team.has_finalizer() {
                debug!("{} has no finalizer, nothing to clean up", team.key());
                return Ok(());
            }
            let director = team
                .original_director()
                .ok_or_else(|| ReconcileError::Unfrozen(team.key()))?
                .to_string();
            let identity = self.identity_admin(&director).await?;
            team.delete_if_exists(identity.as_ref()).await?;

            match self
                .secrets
                .delete(team.secret_namespace(), &team.secret_name())
                .await
            {
                Err(e) if !e.is_not_found() => return Err(e.into()),
                _ => {}
            }

            info!("Removed identity client for {}", team.key());
            if team.ensure_no_finalizer() {
                self.write(team).await?;
            }
            return Ok(());
        }

        if team.prepare_to_save(&self.system_namespace) {
            team = self.write_status(team).await?;
        }

        let director = team
            .original_director()
            .ok_or_else(|| ReconcileError::Unfrozen(team.key()))?
            .to_string();
        let identity = self.identity_admin(&director).await?;

        if team.ensure_finalizer() {
            team = self.write(team).await?;
        }

        let secret =
            get_or_generate(self.secrets.as_ref(), team.secret_namespace(), &team.secret_name())
                .await?;

        let before = team.status.clone();
        team.create_unless_exists(identity.as_ref(), &secret).await?;
        if team.status != before {
            self.write_status(team).await?;
        }
        Ok(())
    }

    /// A Director owns one team in the system namespace, used for its compilation workers.
    pub(super) async fn reconcile_director(&self, mut director: DirectorRecord) -> Result<()> {
        let team = director.team();

        if director.being_deleted() {
            if !director.has_finalizer() {
                return Ok(());
            }
            ignore_not_found(self.store.delete(&team.key()).await)?;
            // The team still needs this Director to remove its identity client.
            match self.store.get(&team.key()).await {
                Ok(_) => {
                    info!("Waiting for {} to be removed", team.key());
                    return Ok(());
                }
                Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
            if director.ensure_no_finalizer() {
                self.write(director).await?;
            }
            return Ok(());
        }

        if director.ensure_finalizer() {
            director = self.write(director).await?;
        }

        ignore_already_exists(self.store.create(team.into_any()).await)?;
        debug!("{} has its team", director.key());
        Ok(())
    }
}
