//! Core domain logic for the dependency matrix tool.
//! This crate is the single source of truth for business invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::AppConfig;
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::history::{HistoryAction, HistoryEntry, HistoryEntryId, HistoryRecord};
pub use model::matrix::{
    Attribute, AttributeId, CategoryGroup, CellKey, Column, Dependencies, Matrix, MatrixError,
    MatrixTotals,
};
pub use model::record::{MatrixId, MatrixInfoUpdate, MatrixRecord, MatrixSummary, NewMatrix};
pub use model::user::{Session, User, UserId, UserRole};
pub use model::validation::ValidationError;
pub use repo::history_repo::{HistoryListQuery, HistoryRepository, SqliteHistoryRepository};
pub use repo::matrix_repo::{MatrixStore, SqliteMatrixRepository};
pub use repo::user_repo::{SqliteUserRepository, UserRepository};
pub use repo::{RepoError, RepoResult};
pub use service::auth_service::AuthService;
pub use service::history_service::HistoryService;
pub use service::matrix_service::{CellToggle, MatrixService, NewAttribute};
pub use service::{ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
