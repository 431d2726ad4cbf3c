//! History log use-cases.
//!
//! # Responsibility
//! - Expose the change log to admins: list, inspect, delete.
//!
//! # Invariants
//! - Every operation here is admin-only.

use crate::model::history::{HistoryEntryId, HistoryRecord};
use crate::model::user::User;
use crate::repo::history_repo::{HistoryListQuery, HistoryRepository};
use crate::service::{require_admin, ServiceError, ServiceResult};
use log::info;

pub struct HistoryService<H: HistoryRepository> {
    repo: H,
}

impl<H: HistoryRepository> HistoryService<H> {
    pub fn new(repo: H) -> Self {
        Self { repo }
    }

    /// Lists entries newest first, optionally filtered by matrix.
    pub fn list(
        &self,
        actor: &User,
        query: &HistoryListQuery,
    ) -> ServiceResult<Vec<HistoryRecord>> {
        require_admin(actor, "list_history")?;
        Ok(self.repo.list_entries(query)?)
    }

    pub fn get(&self, actor: &User, id: HistoryEntryId) -> ServiceResult<HistoryRecord> {
        require_admin(actor, "get_history")?;
        self.repo
            .get_entry(id)?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "history entry",
                id: id.to_string(),
            })
    }

    pub fn delete(&self, actor: &User, id: HistoryEntryId) -> ServiceResult<()> {
        require_admin(actor, "delete_history")?;
        self.repo.delete_entry(id)?;
        info!(
            "event=history_delete module=service status=ok history_id={} actor_id={}",
            id, actor.id
        );
        Ok(())
    }
}
