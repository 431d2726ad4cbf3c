//! Authentication and user administration use-cases.
//!
//! # Responsibility
//! - Register users, log in/out and resolve the current user from a token.
//! - Let admins list users and change roles.
//!
//! # Invariants
//! - Self-registered users always get the `user` role.
//! - `bootstrap_admin` only succeeds while no admin exists.
//! - Passwords and tokens are never logged.
//! - Passwords are stored only as argon2id PHC strings.

use crate::model::user::{Session, User, UserId, UserRole};
use crate::model::validation::{normalize_email, normalize_username, ValidationError};
use crate::repo::user_repo::UserRepository;
use crate::service::{require_admin, ServiceError, ServiceResult};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use log::{info, warn};
use uuid::Uuid;

const MIN_PASSWORD_CHARS: usize = 6;

/// Auth facade over a user repository.
pub struct AuthService<R: UserRepository> {
    repo: R,
}

impl<R: UserRepository> AuthService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a regular user account.
    ///
    /// # Errors
    /// - `Validation` for malformed username, e-mail or a short password.
    /// - `Conflict` when the username is taken.
    pub fn register(&self, username: &str, email: &str, password: &str) -> ServiceResult<User> {
        self.create_account(username, email, password, UserRole::User)
    }

    /// Creates the first admin account. Refused once any admin exists.
    pub fn bootstrap_admin(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> ServiceResult<User> {
        if self.repo.count_admins()? > 0 {
            warn!("event=bootstrap_admin module=auth status=rejected reason=admin_exists");
            return Err(ServiceError::Forbidden {
                operation: "bootstrap_admin",
            });
        }
        self.create_account(username, email, password, UserRole::Admin)
    }

    /// Verifies credentials and issues a session token.
    pub fn login(&self, username: &str, password: &str) -> ServiceResult<Session> {
        let credentials = self.repo.find_credentials(username.trim())?;
        let Some(credentials) = credentials else {
            info!("event=login module=auth status=rejected reason=unknown_user");
            return Err(invalid_credentials());
        };
        if !verify_password(&credentials.password_hash, password)? {
            info!(
                "event=login module=auth status=rejected reason=bad_password user_id={}",
                credentials.user.id
            );
            return Err(invalid_credentials());
        }

        let token = Uuid::new_v4().simple().to_string();
        self.repo.create_session(&token, credentials.user.id)?;
        info!(
            "event=login module=auth status=ok user_id={} role={}",
            credentials.user.id,
            credentials.user.role.as_str()
        );
        Ok(Session {
            token,
            user: credentials.user,
        })
    }

    /// Resolves a token; `None` when no session matches.
    pub fn current_user(&self, token: &str) -> ServiceResult<Option<User>> {
        Ok(self.repo.session_user(token.trim())?)
    }

    /// Like `current_user`, but a missing session is an error.
    pub fn require_user(&self, token: &str) -> ServiceResult<User> {
        self.current_user(token)?.ok_or_else(|| {
            ServiceError::Unauthenticated("session token is unknown or expired".to_string())
        })
    }

    /// Revokes a token. Idempotent.
    pub fn logout(&self, token: &str) -> ServiceResult<()> {
        self.repo.delete_session(token.trim())?;
        info!("event=logout module=auth status=ok");
        Ok(())
    }

    pub fn list_users(&self, actor: &User) -> ServiceResult<Vec<User>> {
        require_admin(actor, "list_users")?;
        Ok(self.repo.list_users()?)
    }

    /// Changes one user's role and returns the updated user.
    pub fn update_user_role(
        &self,
        actor: &User,
        user_id: UserId,
        role: UserRole,
    ) -> ServiceResult<User> {
        require_admin(actor, "update_user_role")?;
        self.repo.update_role(user_id, role)?;
        info!(
            "event=user_role_update module=auth status=ok actor_id={} user_id={} role={}",
            actor.id,
            user_id,
            role.as_str()
        );
        self.repo
            .get_user(user_id)?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "user",
                id: user_id.to_string(),
            })
    }

    fn create_account(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: UserRole,
    ) -> ServiceResult<User> {
        let username = normalize_username(username)?;
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(ValidationError::InvalidValue {
                field: "password",
                reason: format!("must be at least {MIN_PASSWORD_CHARS} characters"),
            }
            .into());
        }

        let user = User::new(username, email, role);
        self.repo.create_user(&user, &hash_password(password)?)?;
        info!(
            "event=user_create module=auth status=ok user_id={} role={}",
            user.id,
            role.as_str()
        );
        Ok(user)
    }
}

fn invalid_credentials() -> ServiceError {
    ServiceError::Unauthenticated("invalid username or password".to_string())
}

/// Hashes with argon2id and a fresh random salt; returns the PHC string.
fn hash_password(password: &str) -> ServiceResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ServiceError::PasswordHash(err.to_string()))
}

// Digest comparison happens inside argon2 in constant time.
fn verify_password(stored: &str, password: &str) -> ServiceResult<bool> {
    let parsed =
        PasswordHash::new(stored).map_err(|err| ServiceError::PasswordHash(err.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::{hash_password, verify_password};

    #[test]
    fn hash_is_salted_phc_string() {
        let first = hash_password("hunter22").unwrap();
        let second = hash_password("hunter22").unwrap();
        assert!(first.starts_with("$argon2id$"));
        assert_ne!(first, second);
        assert!(!first.contains("hunter22"));
    }

    #[test]
    fn verify_accepts_only_the_original_password() {
        let stored = hash_password("hunter22").unwrap();
        assert!(verify_password(&stored, "hunter22").unwrap());
        assert!(!verify_password(&stored, "hunter23").unwrap());
    }

    #[test]
    fn malformed_stored_hash_is_an_error() {
        assert!(verify_password("not-a-phc-string", "hunter22").is_err());
    }
}
