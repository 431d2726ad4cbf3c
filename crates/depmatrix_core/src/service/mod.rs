//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Gate operations on the caller's role and matrix access grants.
//! - Keep CLI/UI layers decoupled from storage details.
//!
//! # Invariants
//! - Services never bypass repository validation/persistence contracts.
//! - Every service API takes the acting `User` explicitly; no ambient session.

use crate::model::matrix::MatrixError;
use crate::model::user::User;
use crate::model::validation::ValidationError;
use crate::repo::RepoError;
use thiserror::Error;

pub mod auth_service;
pub mod history_service;
pub mod matrix_service;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Use-case level error taxonomy.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Missing or malformed caller input.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Target matrix, user or history entry does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    /// Matrix keyword mismatch, or matrix still locked for this user.
    #[error("access denied: {0}")]
    AccessDenied(String),
    /// Bad credentials or unknown/revoked session token.
    #[error("authentication required: {0}")]
    Unauthenticated(String),
    /// Admin-only operation attempted by a regular user.
    #[error("operation `{operation}` requires admin role")]
    Forbidden { operation: &'static str },
    /// Model rule violation, e.g. `DuplicateId` on attribute insert.
    #[error(transparent)]
    Matrix(#[from] MatrixError),
    /// Username or other unique key already taken.
    #[error("{entity} already exists: {key}")]
    Conflict { entity: &'static str, key: String },
    /// Password hashing backend failure or a malformed stored hash.
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepoError::Conflict { entity, key } => Self::Conflict { entity, key },
            RepoError::Matrix(err) => Self::Matrix(err),
            other => Self::Repo(other),
        }
    }
}

pub(crate) fn require_admin(actor: &User, operation: &'static str) -> ServiceResult<()> {
    if actor.is_admin() {
        return Ok(());
    }
    Err(ServiceError::Forbidden { operation })
}
