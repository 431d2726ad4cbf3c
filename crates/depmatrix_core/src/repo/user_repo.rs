//! User and session persistence.
//!
//! # Responsibility
//! - Store users with PHC-encoded password hashes and roles.
//! - Issue, resolve and revoke bearer session tokens.
//!
//! # Invariants
//! - Usernames are unique; duplicates surface as `RepoError::Conflict`.
//! - Password hashes never leave the repository except via `UserCredentials`.

use crate::model::user::{User, UserId, UserRole};
use crate::repo::{
    ensure_connection_ready, is_unique_violation, parse_uuid, timestamp_to_db, RepoError,
    RepoResult,
};
use chrono::Utc;
use rusqlite::{params, Connection, Row};

const USER_SELECT_SQL: &str = "SELECT
    id,
    username,
    email,
    role,
    password_hash
FROM users";

const ENTITY: &str = "user";

/// User row including the stored password hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCredentials {
    pub user: User,
    /// PHC string carrying algorithm, parameters, salt and digest.
    pub password_hash: String,
}

/// Persistence contract for users and sessions.
pub trait UserRepository {
    fn create_user(&self, user: &User, password_hash: &str) -> RepoResult<()>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    fn find_credentials(&self, username: &str) -> RepoResult<Option<UserCredentials>>;
    /// Lists users ordered by username.
    fn list_users(&self) -> RepoResult<Vec<User>>;
    fn update_role(&self, id: UserId, role: UserRole) -> RepoResult<()>;
    fn count_admins(&self) -> RepoResult<u32>;
    fn create_session(&self, token: &str, user_id: UserId) -> RepoResult<()>;
    /// Resolves a token to its user; `None` for unknown or revoked tokens.
    fn session_user(&self, token: &str) -> RepoResult<Option<User>>;
    /// Revokes a token. Unknown tokens are a no-op.
    fn delete_session(&self, token: &str) -> RepoResult<()>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["users", "sessions"])?;
        Ok(Self { conn })
    }

    fn query_one(&self, sql: &str, key: &str) -> RepoResult<Option<UserCredentials>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([key])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_user_row(row)?));
        }
        Ok(None)
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &User, password_hash: &str) -> RepoResult<()> {
        let result = self.conn.execute(
            "INSERT INTO users (
                id,
                username,
                email,
                password_hash,
                role,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                user.id.to_string(),
                user.username.as_str(),
                user.email.as_str(),
                password_hash,
                user.role.as_str(),
                timestamp_to_db(Utc::now()),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(RepoError::Conflict {
                entity: ENTITY,
                key: user.username.clone(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        Ok(self
            .query_one(&format!("{USER_SELECT_SQL} WHERE id = ?1;"), &id.to_string())?
            .map(|credentials| credentials.user))
    }

    fn find_credentials(&self, username: &str) -> RepoResult<Option<UserCredentials>> {
        self.query_one(&format!("{USER_SELECT_SQL} WHERE username = ?1;"), username)
    }

    fn list_users(&self) -> RepoResult<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} ORDER BY username ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?.user);
        }
        Ok(users)
    }

    fn update_role(&self, id: UserId, role: UserRole) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users SET role = ?1 WHERE id = ?2;",
            params![role.as_str(), id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(ENTITY, id));
        }
        Ok(())
    }

    fn count_admins(&self) -> RepoResult<u32> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM users WHERE role = 'admin';",
            [],
            |row| row.get::<_, u32>(0),
        )?;
        Ok(count)
    }

    fn create_session(&self, token: &str, user_id: UserId) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO sessions (token, user_id, created_at) VALUES (?1, ?2, ?3);",
            params![token, user_id.to_string(), timestamp_to_db(Utc::now())],
        )?;
        Ok(())
    }

    fn session_user(&self, token: &str) -> RepoResult<Option<User>> {
        self.query_one(
            "SELECT
                u.id AS id,
                u.username AS username,
                u.email AS email,
                u.role AS role,
                u.password_hash AS password_hash
             FROM sessions s
             JOIN users u ON u.id = s.user_id
             WHERE s.token = ?1;",
            token,
        )
        .map(|found| found.map(|credentials| credentials.user))
    }

    fn delete_session(&self, token: &str) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM sessions WHERE token = ?1;", [token])?;
        Ok(())
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<UserCredentials> {
    let id_text: String = row.get("id")?;
    let role_text: String = row.get("role")?;
    let role = role_text.parse::<UserRole>().map_err(|_| {
        RepoError::InvalidData(format!("invalid role `{role_text}` in users.role"))
    })?;

    Ok(UserCredentials {
        user: User {
            id: parse_uuid(&id_text, "users.id")?,
            username: row.get("username")?,
            email: row.get("email")?,
            role,
        },
        password_hash: row.get("password_hash")?,
    })
}
