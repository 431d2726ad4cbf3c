//! History log contracts and SQLite implementation.
//!
//! # Responsibility
//! - Append change entries and list them newest first.
//!
//! # Invariants
//! - Entries are never modified after append; the only other write is an
//!   explicit delete of a single entry.
//! - Listing order is `recorded_at DESC, id DESC`.

use crate::model::history::{HistoryAction, HistoryEntry, HistoryEntryId, HistoryRecord};
use crate::model::matrix::{CellKey, Matrix};
use crate::model::record::MatrixId;
use crate::model::user::UserRole;
use crate::repo::{
    ensure_connection_ready, parse_timestamp, parse_uuid, timestamp_to_db, RepoError, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const HISTORY_SELECT_SQL: &str = "SELECT
    id,
    matrix_id,
    user_id,
    user_role,
    recorded_at,
    action,
    row_id,
    column_id,
    row_name,
    column_name,
    cell_key,
    details,
    matrix_snapshot
FROM history_entries";

const ENTITY: &str = "history entry";

/// Query options for listing history entries.
#[derive(Debug, Clone, Default)]
pub struct HistoryListQuery {
    pub matrix_id: Option<MatrixId>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Append-only change log contract.
pub trait HistoryRepository {
    fn append_entry(&self, entry: &HistoryEntry) -> RepoResult<HistoryEntryId>;
    fn list_entries(&self, query: &HistoryListQuery) -> RepoResult<Vec<HistoryRecord>>;
    fn get_entry(&self, id: HistoryEntryId) -> RepoResult<Option<HistoryRecord>>;
    fn delete_entry(&self, id: HistoryEntryId) -> RepoResult<()>;
}

/// SQLite-backed history log.
pub struct SqliteHistoryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteHistoryRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["history_entries"])?;
        Ok(Self { conn })
    }
}

impl HistoryRepository for SqliteHistoryRepository<'_> {
    fn append_entry(&self, entry: &HistoryEntry) -> RepoResult<HistoryEntryId> {
        insert_history_entry(self.conn, entry)
    }

    fn list_entries(&self, query: &HistoryListQuery) -> RepoResult<Vec<HistoryRecord>> {
        let mut sql = format!("{HISTORY_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(matrix_id) = query.matrix_id {
            sql.push_str(" AND matrix_id = ?");
            bind_values.push(Value::Text(matrix_id.to_string()));
        }

        sql.push_str(" ORDER BY recorded_at DESC, id DESC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_history_row(row)?);
        }
        Ok(entries)
    }

    fn get_entry(&self, id: HistoryEntryId) -> RepoResult<Option<HistoryRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{HISTORY_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_history_row(row)?));
        }
        Ok(None)
    }

    fn delete_entry(&self, id: HistoryEntryId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM history_entries WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::not_found(ENTITY, id));
        }
        Ok(())
    }
}

/// Inserts one entry on `conn`, which may be an open transaction.
pub(crate) fn insert_history_entry(
    conn: &Connection,
    entry: &HistoryEntry,
) -> RepoResult<HistoryEntryId> {
    let snapshot = match &entry.matrix_snapshot {
        Some(matrix) => Some(serde_json::to_string(matrix).map_err(|err| {
            RepoError::InvalidData(format!("failed to encode matrix snapshot: {err}"))
        })?),
        None => None,
    };

    conn.execute(
        "INSERT INTO history_entries (
            matrix_id,
            user_id,
            user_role,
            recorded_at,
            action,
            row_id,
            column_id,
            row_name,
            column_name,
            cell_key,
            details,
            matrix_snapshot
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
        params![
            entry.matrix_id.map(|id| id.to_string()),
            entry.user_id.to_string(),
            entry.user_role.as_str(),
            timestamp_to_db(entry.timestamp),
            entry.action.as_str(),
            entry.row_id,
            entry.column_id,
            entry.row_name.as_deref(),
            entry.column_name.as_deref(),
            entry.cell_key.map(|key| key.to_string()),
            entry.details.as_deref(),
            snapshot,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

fn parse_history_row(row: &Row<'_>) -> RepoResult<HistoryRecord> {
    let matrix_id = match row.get::<_, Option<String>>("matrix_id")? {
        Some(value) => Some(parse_uuid(&value, "history_entries.matrix_id")?),
        None => None,
    };
    let user_id_text: String = row.get("user_id")?;
    let role_text: String = row.get("user_role")?;
    let user_role = role_text.parse::<UserRole>().map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid role `{role_text}` in history_entries.user_role"
        ))
    })?;
    let recorded_at: String = row.get("recorded_at")?;
    let action_text: String = row.get("action")?;
    let action = action_text.parse::<HistoryAction>().map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid action `{action_text}` in history_entries.action"
        ))
    })?;
    let cell_key = match row.get::<_, Option<String>>("cell_key")? {
        Some(value) => Some(value.parse::<CellKey>().map_err(|err| {
            RepoError::InvalidData(format!("{err} in history_entries.cell_key"))
        })?),
        None => None,
    };
    let matrix_snapshot = match row.get::<_, Option<String>>("matrix_snapshot")? {
        Some(value) => Some(serde_json::from_str::<Matrix>(&value).map_err(|err| {
            RepoError::InvalidData(format!(
                "invalid matrix json in history_entries.matrix_snapshot: {err}"
            ))
        })?),
        None => None,
    };

    Ok(HistoryRecord {
        id: row.get("id")?,
        entry: HistoryEntry {
            matrix_id,
            user_id: parse_uuid(&user_id_text, "history_entries.user_id")?,
            user_role,
            timestamp: parse_timestamp(&recorded_at, "history_entries.recorded_at")?,
            action,
            row_id: row.get("row_id")?,
            column_id: row.get("column_id")?,
            row_name: row.get("row_name")?,
            column_name: row.get("column_name")?,
            cell_key,
            details: row.get("details")?,
            matrix_snapshot,
        },
    })
}
