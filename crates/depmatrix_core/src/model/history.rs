//! Change history entries.
//!
//! # Responsibility
//! - Describe one recorded change: a cell toggle, a user submission or an
//!   admin save.
//!
//! # Invariants
//! - Entries are independent snapshots; nothing is derived from earlier ones.
//! - Toggle entries (`add`/`remove`) carry cell coordinates and names.
//! - Submit/edit entries carry a full matrix snapshot.

use crate::model::matrix::{CellKey, Matrix};
use crate::model::record::MatrixId;
use crate::model::user::{User, UserId, UserRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Storage-assigned, monotonically increasing entry id.
pub type HistoryEntryId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    /// Dependency cell set.
    Add,
    /// Dependency cell cleared.
    Remove,
    /// A user submitted the matrix as filled in.
    SubmitMatrix,
    /// An admin saved structural or info edits.
    EditMatrix,
}

impl HistoryAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::SubmitMatrix => "submit_matrix",
            Self::EditMatrix => "edit_matrix",
        }
    }

    /// Short label for list views.
    pub fn label(self) -> &'static str {
        match self {
            Self::Add => "Added dependency",
            Self::Remove => "Removed dependency",
            Self::SubmitMatrix => "Submitted matrix",
            Self::EditMatrix => "Edited matrix",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown history action `{0}`")]
pub struct UnknownActionError(pub String);

impl FromStr for HistoryAction {
    type Err = UnknownActionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "add" => Ok(Self::Add),
            "remove" => Ok(Self::Remove),
            "submit_matrix" => Ok(Self::SubmitMatrix),
            "edit_matrix" => Ok(Self::EditMatrix),
            other => Err(UnknownActionError(other.to_string())),
        }
    }
}

/// One change record as written by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix_id: Option<MatrixId>,
    pub user_id: UserId,
    pub user_role: UserRole,
    pub timestamp: DateTime<Utc>,
    pub action: HistoryAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_key: Option<CellKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix_snapshot: Option<Matrix>,
}

impl HistoryEntry {
    fn base(actor: &User, matrix_id: MatrixId, action: HistoryAction) -> Self {
        Self {
            matrix_id: Some(matrix_id),
            user_id: actor.id,
            user_role: actor.role,
            timestamp: Utc::now(),
            action,
            row_id: None,
            column_id: None,
            row_name: None,
            column_name: None,
            cell_key: None,
            details: None,
            matrix_snapshot: None,
        }
    }

    /// Entry for one toggled cell; `marked` is the value after the toggle.
    pub fn cell_change(
        actor: &User,
        matrix_id: MatrixId,
        matrix: &Matrix,
        key: CellKey,
        marked: bool,
    ) -> Self {
        let action = if marked {
            HistoryAction::Add
        } else {
            HistoryAction::Remove
        };
        Self {
            row_id: Some(key.row),
            column_id: Some(key.column),
            row_name: matrix.attribute(key.row).map(|row| row.name.clone()),
            column_name: matrix.column(key.column).map(|column| column.name.clone()),
            cell_key: Some(key),
            ..Self::base(actor, matrix_id, action)
        }
    }

    /// Entry recording a user's submission with a snapshot of the matrix.
    pub fn submission(actor: &User, matrix_id: MatrixId, snapshot: &Matrix) -> Self {
        Self {
            details: Some(format!("{} submitted their matrix", actor.username)),
            matrix_snapshot: Some(snapshot.clone()),
            ..Self::base(actor, matrix_id, HistoryAction::SubmitMatrix)
        }
    }

    /// Entry recording an admin save with a snapshot of the matrix.
    pub fn admin_edit(
        actor: &User,
        matrix_id: MatrixId,
        snapshot: &Matrix,
        details: impl Into<String>,
    ) -> Self {
        Self {
            details: Some(details.into()),
            matrix_snapshot: Some(snapshot.clone()),
            ..Self::base(actor, matrix_id, HistoryAction::EditMatrix)
        }
    }

    /// One-line human description.
    pub fn describe(&self) -> String {
        match self.action {
            HistoryAction::Add | HistoryAction::Remove => {
                let verb = if self.action == HistoryAction::Add {
                    "Added"
                } else {
                    "Removed"
                };
                format!(
                    "{verb} dependency between {} and {}",
                    self.row_name.as_deref().unwrap_or("?"),
                    self.column_name.as_deref().unwrap_or("?")
                )
            }
            HistoryAction::SubmitMatrix | HistoryAction::EditMatrix => self
                .details
                .clone()
                .unwrap_or_else(|| self.action.label().to_string()),
        }
    }
}

/// Stored entry with its storage id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryRecord {
    pub id: HistoryEntryId,
    #[serde(flatten)]
    pub entry: HistoryEntry,
}
