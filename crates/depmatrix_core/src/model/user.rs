//! User, role and session shapes supplied by the auth layer.
//!
//! # Invariants
//! - Roles are exactly `user` and `admin`.
//! - Matrix model code is role-agnostic; services gate on `UserRole`.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Stable user identifier.
pub type UserId = Uuid;

/// Opaque bearer token issued at login.
pub type SessionToken = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Fills in matrices after unlocking them with the access keyword.
    User,
    /// Manages matrices, attributes, users and history. Bypasses keywords.
    Admin,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    pub fn is_admin(self) -> bool {
        self == Self::Admin
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role `{0}`; expected user|admin")]
pub struct UnknownRoleError(pub String);

impl FromStr for UserRole {
    type Err = UnknownRoleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(UnknownRoleError(other.to_string())),
        }
    }
}

/// Authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: UserRole,
}

impl User {
    pub fn new(username: impl Into<String>, email: impl Into<String>, role: UserRole) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Login result: bearer token plus the principal it resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub token: SessionToken,
    pub user: User,
}
