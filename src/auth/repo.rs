use async_trait::async_trait;
use sqlx::PgPool;

use crate::auth::repo_types::{StoreError, User, UserId};

/// Persistence contract for user credentials.
///
/// `create` must be atomic with respect to username uniqueness: two
/// concurrent calls for the same username never both succeed.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn create(&self, username: &str, password_hash: &str) -> Result<UserId, StoreError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
}

/// Postgres-backed store. Uniqueness is enforced by `users_username_key`.
#[derive(Clone)]
pub struct PgCredentialStore {
    db: PgPool,
}

impl PgCredentialStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn create(&self, username: &str, password_hash: &str) -> Result<UserId, StoreError> {
        let id: UserId = sqlx::query_scalar(
            r#"
            INSERT INTO users (username, password_hash)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.db)
        .await?;
        Ok(id)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }
}

#[cfg(test)]
pub mod memory {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::CredentialStore;
    use crate::auth::repo_types::{StoreError, User, UserId};

    #[derive(Default)]
    struct Inner {
        next_id: UserId,
        by_name: HashMap<String, User>,
    }

    /// In-memory double with the same uniqueness semantics as the Postgres store.
    #[derive(Default)]
    pub struct MemoryCredentialStore {
        inner: Mutex<Inner>,
        offline: AtomicBool,
    }

    impl MemoryCredentialStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes every subsequent call fail as if the database were down.
        pub fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        fn check_online(&self) -> Result<(), StoreError> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable(sqlx::Error::PoolTimedOut));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl CredentialStore for MemoryCredentialStore {
        async fn create(&self, username: &str, password_hash: &str) -> Result<UserId, StoreError> {
            self.check_online()?;
            let mut inner = self.inner.lock().expect("store mutex poisoned");
            if inner.by_name.contains_key(username) {
                return Err(StoreError::DuplicateUsername);
            }
            inner.next_id += 1;
            let id = inner.next_id;
            inner.by_name.insert(
                username.to_string(),
                User {
                    id,
                    username: username.to_string(),
                    password_hash: password_hash.to_string(),
                },
            );
            Ok(id)
        }

        async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
            self.check_online()?;
            let inner = self.inner.lock().expect("store mutex poisoned");
            Ok(inner.by_name.get(username).cloned())
        }
    }

    mod tests {
        use std::sync::Arc;

        use super::*;

        #[tokio::test]
        async fn ids_are_monotonic() {
            let store = MemoryCredentialStore::new();
            let a = store.create("alice", "h1").await.expect("create alice");
            let b = store.create("bob", "h2").await.expect("create bob");
            assert_eq!(a, 1);
            assert!(b > a);
        }

        #[tokio::test]
        async fn duplicate_username_rejected_and_case_sensitive() {
            let store = MemoryCredentialStore::new();
            store.create("alice", "h1").await.expect("first create");
            let err = store.create("alice", "h2").await.unwrap_err();
            assert!(matches!(err, StoreError::DuplicateUsername));
            store.create("Alice", "h3").await.expect("different case is a different user");

            let found = store.find_by_username("alice").await.expect("lookup").expect("present");
            assert_eq!(found.password_hash, "h1");
        }

        #[tokio::test]
        async fn concurrent_creates_admit_exactly_one() {
            let store = Arc::new(MemoryCredentialStore::new());
            let mut handles = Vec::new();
            for i in 0..16 {
                let store = store.clone();
                handles.push(tokio::spawn(async move {
                    store.create("racer", &format!("hash-{i}")).await
                }));
            }
            let mut ok = 0;
            for h in handles {
                if h.await.expect("task panicked").is_ok() {
                    ok += 1;
                }
            }
            assert_eq!(ok, 1);
        }

        #[tokio::test]
        async fn offline_store_reports_unavailable() {
            let store = MemoryCredentialStore::new();
            store.set_offline(true);
            let err = store.find_by_username("alice").await.unwrap_err();
            assert!(matches!(err, StoreError::Unavailable(_)));
        }
    }
}
