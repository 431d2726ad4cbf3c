//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Matrix writes must pass `Matrix::validate()` before persistence.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to DB transport errors.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::matrix::MatrixError;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, ErrorCode};
use thiserror::Error;
use uuid::Uuid;

pub mod history_repo;
pub mod matrix_repo;
pub mod user_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for persistence and query operations.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("{entity} already exists: {key}")]
    Conflict { entity: &'static str, key: String },
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
    #[error(transparent)]
    Matrix(#[from] MatrixError),
    #[error("repository requires schema version {expected_version}, got {actual_version}")]
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    #[error("repository requires table `{0}`")]
    MissingRequiredTable(&'static str),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl RepoError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Checks the connection is migrated and carries the tables a repository needs.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    tables: &[&'static str],
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &table in tables {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

// Fixed-width fraction keeps text order equal to time order.
pub(crate) fn timestamp_to_db(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_timestamp(value: &str, column: &str) -> RepoResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| RepoError::InvalidData(format!("invalid timestamp `{value}` in {column}")))
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation
    )
}
