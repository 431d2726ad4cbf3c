//! Matrix use-case service.
//!
//! # Responsibility
//! - Create, list, open, edit, save and delete matrix documents.
//! - Enforce the keyword access gate (`Locked -> Unlocked` per matrix/user).
//! - Write one history entry per cell toggle, submission and admin save.
//!
//! # Invariants
//! - Admins bypass the keyword gate unconditionally.
//! - Every mutation loads the stored document, applies the change to that
//!   copy and writes the whole document back. Concurrent writers race; the
//!   last write wins.
//! - A document write and its history entry commit together. A failed save
//!   leaves the stored document untouched and is not retried.

use crate::model::history::{HistoryEntry, HistoryEntryId};
use crate::model::matrix::{AttributeId, CellKey, MatrixTotals};
use crate::model::record::{MatrixId, MatrixInfoUpdate, MatrixRecord, MatrixSummary, NewMatrix};
use crate::model::user::User;
use crate::model::validation::require_non_empty;
use crate::repo::history_repo::HistoryRepository;
use crate::repo::matrix_repo::MatrixStore;
use crate::service::{require_admin, ServiceError, ServiceResult};
use log::{info, warn};

const ADMIN_SAVE_DETAILS: &str = "Admin edited and saved the matrix";

/// Result of one cell toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellToggle {
    pub key: CellKey,
    /// Cell value after the toggle.
    pub marked: bool,
    pub totals: MatrixTotals,
    pub history_id: HistoryEntryId,
}

/// Input for adding one attribute row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttribute {
    pub name: String,
    pub category: String,
    /// Explicit id; `max + 1` when absent.
    pub requested_id: Option<AttributeId>,
}

/// Matrix use-case facade over a matrix store and a history log.
pub struct MatrixService<M: MatrixStore, H: HistoryRepository> {
    matrices: M,
    history: H,
}

impl<M: MatrixStore, H: HistoryRepository> MatrixService<M, H> {
    pub fn new(matrices: M, history: H) -> Self {
        Self { matrices, history }
    }

    /// Lists keyword-free summaries. Available to every authenticated user.
    pub fn list_matrices(&self, _actor: &User) -> ServiceResult<Vec<MatrixSummary>> {
        Ok(self
            .matrices
            .list_matrices()?
            .iter()
            .map(MatrixRecord::summary)
            .collect())
    }

    /// Creates a matrix seeded with the default rows unless `data` is given.
    ///
    /// # Errors
    /// - `Forbidden` for non-admins.
    /// - `Validation` when title or keyword is blank.
    pub fn create_matrix(&self, actor: &User, request: NewMatrix) -> ServiceResult<MatrixRecord> {
        require_admin(actor, "create_matrix")?;
        let record = MatrixRecord::from_request(request, actor.id)?;
        self.matrices.create_matrix(&record)?;
        info!(
            "event=matrix_create module=service status=ok matrix_id={} actor_id={} rows={}",
            record.id,
            actor.id,
            record.data.rows().len()
        );
        Ok(record)
    }

    /// Returns whether `actor` may read and fill in the matrix.
    pub fn is_unlocked(&self, actor: &User, id: MatrixId) -> ServiceResult<bool> {
        if actor.is_admin() {
            return Ok(true);
        }
        Ok(self.matrices.has_access(id, actor.id)?)
    }

    /// Unlocks the matrix for `actor` when `keyword` matches exactly.
    ///
    /// A mismatch is recoverable: the caller may prompt again.
    pub fn unlock_matrix(&self, actor: &User, id: MatrixId, keyword: &str) -> ServiceResult<()> {
        if actor.is_admin() {
            self.load(id)?;
            return Ok(());
        }
        if !self.matrices.verify_keyword(id, keyword)? {
            warn!(
                "event=matrix_unlock module=service status=rejected matrix_id={} user_id={}",
                id, actor.id
            );
            return Err(ServiceError::AccessDenied("invalid keyword".to_string()));
        }
        self.matrices.grant_access(id, actor.id)?;
        info!(
            "event=matrix_unlock module=service status=ok matrix_id={} user_id={}",
            id, actor.id
        );
        Ok(())
    }

    /// Loads a matrix the actor has unlocked.
    pub fn open_matrix(&self, actor: &User, id: MatrixId) -> ServiceResult<MatrixRecord> {
        let record = self.load(id)?;
        self.ensure_unlocked(actor, id)?;
        Ok(record)
    }

    /// Flips one upper-triangle cell, persists the document and logs the change.
    pub fn toggle_cell(
        &self,
        actor: &User,
        id: MatrixId,
        row: AttributeId,
        column: AttributeId,
    ) -> ServiceResult<CellToggle> {
        let mut record = self.open_matrix(actor, id)?;
        let marked = record.data.toggle_dependency(row, column)?;
        let key = CellKey::new(row, column);
        let entry = HistoryEntry::cell_change(actor, id, &record.data, key, marked);
        let history_id = self.matrices.put_matrix_logged(&record, &entry)?;
        info!(
            "event=matrix_toggle module=service status=ok matrix_id={} actor_id={} cell={} marked={}",
            id, actor.id, key, marked
        );
        Ok(CellToggle {
            key,
            marked,
            totals: record.data.compute_totals(),
            history_id,
        })
    }

    /// Records a submission snapshot of the stored matrix.
    pub fn submit_matrix(&self, actor: &User, id: MatrixId) -> ServiceResult<HistoryEntryId> {
        let record = self.open_matrix(actor, id)?;
        let history_id = self
            .history
            .append_entry(&HistoryEntry::submission(actor, id, &record.data))?;
        info!(
            "event=matrix_submit module=service status=ok matrix_id={} actor_id={} history_id={}",
            id, actor.id, history_id
        );
        Ok(history_id)
    }

    /// Replaces the stored document with `record` and logs an admin edit.
    ///
    /// Whole-document overwrite: concurrent edits made since `record` was
    /// loaded are lost.
    pub fn save_matrix(
        &self,
        actor: &User,
        record: &MatrixRecord,
    ) -> ServiceResult<HistoryEntryId> {
        require_admin(actor, "save_matrix")?;
        record.validate_info()?;
        let entry = HistoryEntry::admin_edit(actor, record.id, &record.data, ADMIN_SAVE_DETAILS);
        let history_id = self.matrices.put_matrix_logged(record, &entry)?;
        info!(
            "event=matrix_save module=service status=ok matrix_id={} actor_id={} rows={} dependencies={}",
            record.id,
            actor.id,
            record.data.rows().len(),
            record.data.dependencies().len()
        );
        Ok(history_id)
    }

    /// Adds an attribute row (and mirrored column) and saves.
    ///
    /// # Errors
    /// - `Matrix(DuplicateId)` when the requested id is taken.
    pub fn add_attribute(
        &self,
        actor: &User,
        id: MatrixId,
        attribute: NewAttribute,
    ) -> ServiceResult<AttributeId> {
        require_admin(actor, "add_attribute")?;
        let name = require_non_empty("name", &attribute.name)?.to_string();
        let category = require_non_empty("category", &attribute.category)?.to_string();

        let mut record = self.load(id)?;
        let attribute_id = record
            .data
            .add_attribute(name, category, attribute.requested_id)?;
        self.save_matrix(actor, &record)?;
        Ok(attribute_id)
    }

    /// Removes an attribute and its dependencies. Returns whether it existed.
    pub fn remove_attribute(
        &self,
        actor: &User,
        id: MatrixId,
        attribute_id: AttributeId,
    ) -> ServiceResult<bool> {
        require_admin(actor, "remove_attribute")?;
        let mut record = self.load(id)?;
        if !record.data.remove_attribute(attribute_id) {
            return Ok(false);
        }
        self.save_matrix(actor, &record)?;
        Ok(true)
    }

    /// Renames an attribute. Returns whether it existed.
    pub fn rename_attribute(
        &self,
        actor: &User,
        id: MatrixId,
        attribute_id: AttributeId,
        name: &str,
    ) -> ServiceResult<bool> {
        require_admin(actor, "rename_attribute")?;
        let name = require_non_empty("name", name)?;
        let mut record = self.load(id)?;
        if !record.data.rename_attribute(attribute_id, name) {
            return Ok(false);
        }
        self.save_matrix(actor, &record)?;
        Ok(true)
    }

    /// Edits title, description or keyword and saves.
    pub fn update_info(
        &self,
        actor: &User,
        id: MatrixId,
        update: &MatrixInfoUpdate,
    ) -> ServiceResult<MatrixRecord> {
        require_admin(actor, "update_info")?;
        let mut record = self.load(id)?;
        if update.is_empty() {
            return Ok(record);
        }
        update.apply_to(&mut record)?;
        self.save_matrix(actor, &record)?;
        Ok(record)
    }

    /// Returns the access keyword for sharing.
    pub fn share_keyword(&self, actor: &User, id: MatrixId) -> ServiceResult<String> {
        require_admin(actor, "share_keyword")?;
        Ok(self.load(id)?.keyword)
    }

    pub fn delete_matrix(&self, actor: &User, id: MatrixId) -> ServiceResult<()> {
        require_admin(actor, "delete_matrix")?;
        self.matrices.delete_matrix(id)?;
        info!(
            "event=matrix_delete module=service status=ok matrix_id={} actor_id={}",
            id, actor.id
        );
        Ok(())
    }

    fn load(&self, id: MatrixId) -> ServiceResult<MatrixRecord> {
        self.matrices
            .get_matrix(id)?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "matrix",
                id: id.to_string(),
            })
    }

    fn ensure_unlocked(&self, actor: &User, id: MatrixId) -> ServiceResult<()> {
        if self.is_unlocked(actor, id)? {
            return Ok(());
        }
        Err(ServiceError::AccessDenied(
            "matrix is locked; keyword required".to_string(),
        ))
    }
}
