use std::sync::Arc;

use tracing::{error, info, warn};

use crate::auth::claims::Identity;
use crate::auth::jwt::JwtKeys;
use crate::auth::password::Hasher;
use crate::auth::repo::CredentialStore;
use crate::auth::repo_types::{StoreError, UserId};
use crate::errors::AuthError;

/// Registration, login and token authentication over an injected store.
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    hasher: Hasher,
    keys: JwtKeys,
    // verified against when the username is unknown so both rejection paths cost the same
    dummy_hash: String,
}

impl AuthService {
    pub fn new(store: Arc<dyn CredentialStore>, hasher: Hasher, keys: JwtKeys) -> anyhow::Result<Self> {
        let dummy_hash = hasher.hash("weatherdash-dummy-password")?;
        Ok(Self {
            store,
            hasher,
            keys,
            dummy_hash,
        })
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<UserId, AuthError> {
        validate_input(username, password)?;

        let hash = self.hash_blocking(password).await?;

        match self.store.create(username, &hash).await {
            Ok(id) => {
                info!(user_id = id, username, "user registered");
                Ok(id)
            }
            Err(StoreError::DuplicateUsername) => {
                warn!(username, "username already registered");
                Err(AuthError::Conflict)
            }
            Err(e) => Err(store_failure(e)),
        }
    }

    /// Returns a signed session token on success.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        validate_input(username, password)?;

        let user = self
            .store
            .find_by_username(username)
            .await
            .map_err(store_failure)?;

        let stored_hash = user
            .as_ref()
            .map_or_else(|| self.dummy_hash.clone(), |u| u.password_hash.clone());
        let matches = self.verify_blocking(password, stored_hash).await?;

        let user = match user {
            Some(u) if matches => u,
            Some(u) => {
                warn!(user_id = u.id, "login invalid password");
                return Err(AuthError::InvalidCredentials);
            }
            None => {
                warn!(username, "login unknown username");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let token = self.keys.issue(user.id, &user.username).map_err(|e| {
            error!(error = %e, "jwt sign failed");
            AuthError::Internal
        })?;

        info!(user_id = user.id, "user logged in");
        Ok(token)
    }

    pub fn authenticate(&self, token: Option<&str>) -> Result<Identity, AuthError> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::Unauthorized)?;
        self.keys.verify(token).map_err(|_| AuthError::InvalidToken)
    }

    async fn hash_blocking(&self, password: &str) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| {
                error!(error = %e, "hash task failed");
                AuthError::Internal
            })?
            .map_err(|e| {
                error!(error = %e, "hash_password failed");
                AuthError::Internal
            })
    }

    async fn verify_blocking(&self, password: &str, hash: String) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| {
                error!(error = %e, "verify task failed");
                AuthError::Internal
            })
    }
}

fn validate_input(username: &str, password: &str) -> Result<(), AuthError> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(AuthError::InvalidInput);
    }
    // Postgres TEXT cannot hold NUL
    if username.chars().chain(password.chars()).any(char::is_control) {
        return Err(AuthError::InvalidInput);
    }
    Ok(())
}

fn store_failure(e: StoreError) -> AuthError {
    error!(error = ?e, "credential store failure");
    AuthError::StoreUnavailable
}

#[cfg(test)]
pub(crate) fn test_service(store: Arc<dyn CredentialStore>) -> AuthService {
    use crate::auth::jwt::test_jwt_config;
    use crate::auth::password::fast_hasher;

    AuthService::new(store, fast_hasher(), JwtKeys::new(&test_jwt_config()))
        .expect("service should build")
}
