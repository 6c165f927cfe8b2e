//! Anonymous identities: generated handle/secret pairs and a plaintext login.

use crate::database::models::{NewUser, UserRecord};
use crate::database::repositories::UserRepository;
use crate::database::Database;
use crate::error::DomainError;
use crate::utils::now_utc_iso;
use anyhow::Result;
use rand::Rng;
use rusqlite::ErrorCode;
use uuid::Uuid;

/// Handles carry 16 random bits, so a busy instance will see collisions.
const MAX_CREDENTIAL_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Fresh `user_xxxx` handle and an 8 hex digit secret.
pub fn generate_credentials() -> Credentials {
    let mut rng = rand::rng();
    let handle: u16 = rng.random();
    let secret: u32 = rng.random();
    Credentials {
        username: format!("user_{handle:04x}"),
        password: format!("{secret:08x}"),
    }
}

#[derive(Clone)]
pub struct UserService {
    database: Database,
}

impl UserService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Issues a new anonymous user. The returned record still holds the
    /// plaintext secret so it can be shown once.
    pub fn create_user(&self) -> Result<UserRecord, DomainError> {
        let mut last_err = None;
        for attempt in 1..=MAX_CREDENTIAL_ATTEMPTS {
            let credentials = generate_credentials();
            let new_user = NewUser {
                id: Uuid::new_v4().to_string(),
                username: credentials.username,
                password: credentials.password,
                created_at: now_utc_iso(),
            };
            match self
                .database
                .with_repositories(|repos| repos.users().create(&new_user))
            {
                Ok(user) => {
                    tracing::info!(user_id = %user.id, user_count = user.user_count, "user created");
                    return Ok(user);
                }
                Err(err) if is_unique_violation(&err) => {
                    tracing::debug!(attempt, "generated credentials collided, retrying");
                    last_err = Some(err);
                }
                Err(err) => return Err(DomainError::Storage(err)),
            }
        }
        let err = last_err.unwrap_or_else(|| anyhow::anyhow!("credential generation failed"));
        Err(DomainError::Storage(err.context(format!(
            "no unique credentials after {MAX_CREDENTIAL_ATTEMPTS} attempts"
        ))))
    }

    /// Plaintext comparison of opaque tokens.
    pub fn login(&self, username: &str, password: &str) -> Result<UserRecord, DomainError> {
        let user = self
            .database
            .with_repositories(|repos| repos.users().find_by_username(username))?
            .ok_or_else(|| DomainError::Unauthorized("Invalid username".into()))?;
        if user.password != password {
            return Err(DomainError::Unauthorized("Invalid password".into()));
        }
        Ok(user)
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserRecord>> {
        self.database.with_repositories(|repos| repos.users().get(id))
    }
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(code, _)) if code.code == ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_service() -> UserService {
        UserService::new(crate::database::in_memory())
    }

    #[test]
    fn generated_credentials_have_the_expected_shape() {
        let creds = generate_credentials();
        assert!(creds.username.starts_with("user_"));
        assert_eq!(creds.username.len(), 9);
        assert_eq!(creds.password.len(), 8);
        assert!(creds.password.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn users_get_sequential_counts_and_can_log_in() {
        let service = setup_service();
        let first = service.create_user().expect("first");
        let second = service.create_user().expect("second");
        assert_eq!(first.user_count, 1);
        assert_eq!(second.user_count, 2);

        let logged_in = service
            .login(&second.username, &second.password)
            .expect("login");
        assert_eq!(logged_in.id, second.id);
    }

    #[test]
    fn login_distinguishes_unknown_user_from_bad_secret() {
        let service = setup_service();
        let user = service.create_user().expect("create");

        let err = service.login("user_nope", "x").unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(ref m) if m == "Invalid username"));

        let err = service.login(&user.username, "wrong").unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(ref m) if m == "Invalid password"));
    }

    #[test]
    fn get_user_returns_none_for_unknown_ids() {
        let service = setup_service();
        assert!(service.get_user("ghost").unwrap().is_none());
    }
}
