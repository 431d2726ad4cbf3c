//! Matrix store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide get/put/delete over whole matrix documents.
//! - Verify access keywords and persist per-(matrix, user) access grants.
//!
//! # Invariants
//! - `put_matrix` replaces the whole document: last writer wins, no merge,
//!   no optimistic-concurrency token.
//! - `created_at`/`created_by` are fixed at creation and never rewritten.
//! - `shared_with` is derived from access grants on read and ignored on write.
//! - `put_matrix_logged` commits the document and its history entry together
//!   or not at all.

use crate::model::history::{HistoryEntry, HistoryEntryId};
use crate::model::matrix::Matrix;
use crate::model::record::{MatrixId, MatrixRecord};
use crate::model::user::UserId;
use crate::repo::history_repo::insert_history_entry;
use crate::repo::{
    ensure_connection_ready, parse_timestamp, parse_uuid, timestamp_to_db, RepoError, RepoResult,
};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

const MATRIX_SELECT_SQL: &str = "SELECT
    id,
    title,
    description,
    keyword,
    created_at,
    created_by,
    data
FROM matrices";

const ENTITY: &str = "matrix";

/// Persistence contract for matrix documents.
pub trait MatrixStore {
    /// Lists all matrices, oldest first.
    fn list_matrices(&self) -> RepoResult<Vec<MatrixRecord>>;
    /// Loads one matrix; `None` when the id is unknown.
    fn get_matrix(&self, id: MatrixId) -> RepoResult<Option<MatrixRecord>>;
    /// Inserts a new matrix document.
    fn create_matrix(&self, record: &MatrixRecord) -> RepoResult<MatrixId>;
    /// Replaces an existing matrix document.
    fn put_matrix(&self, record: &MatrixRecord) -> RepoResult<()>;
    /// Replaces an existing matrix document and appends `entry` in one
    /// transaction. On error neither write is visible.
    fn put_matrix_logged(
        &self,
        record: &MatrixRecord,
        entry: &HistoryEntry,
    ) -> RepoResult<HistoryEntryId>;
    /// Deletes a matrix and its access grants.
    fn delete_matrix(&self, id: MatrixId) -> RepoResult<()>;
    /// Compares `keyword` against the stored keyword.
    fn verify_keyword(&self, id: MatrixId, keyword: &str) -> RepoResult<bool>;
    /// Records that `user_id` unlocked `id`. Idempotent.
    fn grant_access(&self, id: MatrixId, user_id: UserId) -> RepoResult<()>;
    /// Returns whether `user_id` has unlocked `id`.
    fn has_access(&self, id: MatrixId, user_id: UserId) -> RepoResult<bool>;
}

/// SQLite-backed matrix store.
pub struct SqliteMatrixRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMatrixRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["matrices", "matrix_access", "history_entries"])?;
        Ok(Self { conn })
    }

    fn load_shared_with(&self, id: MatrixId) -> RepoResult<Vec<UserId>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id
             FROM matrix_access
             WHERE matrix_id = ?1
             ORDER BY granted_at ASC, user_id ASC;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            let raw: String = row.get(0)?;
            users.push(parse_uuid(&raw, "matrix_access.user_id")?);
        }
        Ok(users)
    }
}

impl MatrixStore for SqliteMatrixRepository<'_> {
    fn list_matrices(&self) -> RepoResult<Vec<MatrixRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{MATRIX_SELECT_SQL} ORDER BY created_at ASC, id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_matrix_row(row)?);
        }
        drop(rows);

        for record in &mut records {
            record.shared_with = self.load_shared_with(record.id)?;
        }
        Ok(records)
    }

    fn get_matrix(&self, id: MatrixId) -> RepoResult<Option<MatrixRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{MATRIX_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let mut record = parse_matrix_row(row)?;
        record.shared_with = self.load_shared_with(id)?;
        Ok(Some(record))
    }

    fn create_matrix(&self, record: &MatrixRecord) -> RepoResult<MatrixId> {
        record.data.validate()?;
        let now = timestamp_to_db(Utc::now());

        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO matrices (
                id,
                title,
                description,
                keyword,
                created_at,
                created_by,
                data,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                record.id.to_string(),
                record.title.as_str(),
                record.description.as_str(),
                record.keyword.as_str(),
                timestamp_to_db(record.created_at),
                record.created_by.to_string(),
                encode_matrix(&record.data)?,
                now,
            ],
        )?;
        if inserted == 0 {
            return Err(RepoError::Conflict {
                entity: ENTITY,
                key: record.id.to_string(),
            });
        }

        Ok(record.id)
    }

    fn put_matrix(&self, record: &MatrixRecord) -> RepoResult<()> {
        update_matrix_row(self.conn, record)
    }

    fn put_matrix_logged(
        &self,
        record: &MatrixRecord,
        entry: &HistoryEntry,
    ) -> RepoResult<HistoryEntryId> {
        // Dropping the transaction without commit rolls both writes back.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        update_matrix_row(&tx, record)?;
        let history_id = insert_history_entry(&tx, entry)?;
        tx.commit()?;
        Ok(history_id)
    }

    fn delete_matrix(&self, id: MatrixId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM matrices WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::not_found(ENTITY, id));
        }
        Ok(())
    }

    fn verify_keyword(&self, id: MatrixId, keyword: &str) -> RepoResult<bool> {
        let stored: Option<String> = self
            .conn
            .query_row(
                "SELECT keyword FROM matrices WHERE id = ?1;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match stored {
            Some(stored) => Ok(stored == keyword),
            None => Err(RepoError::not_found(ENTITY, id)),
        }
    }

    fn grant_access(&self, id: MatrixId, user_id: UserId) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO matrix_access (matrix_id, user_id, granted_at)
             VALUES (?1, ?2, ?3);",
            params![
                id.to_string(),
                user_id.to_string(),
                timestamp_to_db(Utc::now())
            ],
        )?;
        Ok(())
    }

    fn has_access(&self, id: MatrixId, user_id: UserId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM matrix_access
                WHERE matrix_id = ?1 AND user_id = ?2
            );",
            params![id.to_string(), user_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

fn update_matrix_row(conn: &Connection, record: &MatrixRecord) -> RepoResult<()> {
    record.data.validate()?;

    let changed = conn.execute(
        "UPDATE matrices
         SET
            title = ?1,
            description = ?2,
            keyword = ?3,
            data = ?4,
            updated_at = ?5
         WHERE id = ?6;",
        params![
            record.title.as_str(),
            record.description.as_str(),
            record.keyword.as_str(),
            encode_matrix(&record.data)?,
            timestamp_to_db(Utc::now()),
            record.id.to_string(),
        ],
    )?;

    if changed == 0 {
        return Err(RepoError::not_found(ENTITY, record.id));
    }
    Ok(())
}

fn encode_matrix(matrix: &Matrix) -> RepoResult<String> {
    serde_json::to_string(matrix)
        .map_err(|err| RepoError::InvalidData(format!("failed to encode matrix data: {err}")))
}

fn parse_matrix_row(row: &Row<'_>) -> RepoResult<MatrixRecord> {
    let id_text: String = row.get("id")?;
    let created_at_text: String = row.get("created_at")?;
    let created_by_text: String = row.get("created_by")?;
    let data_text: String = row.get("data")?;

    let data: Matrix = serde_json::from_str(&data_text).map_err(|err| {
        RepoError::InvalidData(format!("invalid matrix json in matrices.data for {id_text}: {err}"))
    })?;
    data.validate()?;

    Ok(MatrixRecord {
        id: parse_uuid(&id_text, "matrices.id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        keyword: row.get("keyword")?,
        created_at: parse_timestamp(&created_at_text, "matrices.created_at")?,
        created_by: parse_uuid(&created_by_text, "matrices.created_by")?,
        data,
        shared_with: Vec::new(),
    })
}
