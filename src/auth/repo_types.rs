use std::fmt;

use sqlx::FromRow;
use thiserror::Error;

pub type UserId = i64;

/// User record in the database.
#[derive(Clone, FromRow)]
pub struct User {
    pub id: UserId,            // BIGSERIAL, assigned by the store
    pub username: String,      // unique, case-sensitive
    pub password_hash: String, // Argon2 PHC string, never leaves the server
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("username already taken")]
    DuplicateUsername,
    #[error("credential store unavailable")]
    Unavailable(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateUsername,
            _ => StoreError::Unavailable(e),
        }
    }
}
