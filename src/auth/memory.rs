use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::store::{StoreError, User, UserStore};

/// In-memory user store backing the unit tests.
///
/// Uniqueness checks and the insert happen under a single lock, giving the
/// same one-winner guarantee as the Postgres unique constraints.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<Vec<User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, StoreError> {
        let mut users = self.users.lock().expect("user store lock poisoned");
        if users.iter().any(|u| u.username == username) {
            return Err(StoreError::DuplicateUsername);
        }
        if users.iter().any(|u| u.email == email) {
            return Err(StoreError::DuplicateEmail);
        }
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
            last_login: None,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().expect("user store lock poisoned");
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().expect("user store lock poisoned");
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().expect("user store lock poisoned");
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn update_last_login(&self, id: Uuid, at: OffsetDateTime) -> Result<(), StoreError> {
        let mut users = self.users.lock().expect("user store lock poisoned");
        match users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.last_login = Some(at);
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_assigns_id_and_created_at() {
        let store = InMemoryUserStore::new();
        let user = store
            .create("alice", "alice@x.com", "$argon2id$fake")
            .await
            .expect("create");
        assert_eq!(user.username, "alice");
        assert_eq!(user.email, "alice@x.com");
        assert!(user.last_login.is_none());

        let found = store.find_by_id(user.id).await.expect("find").expect("some");
        assert_eq!(found.username, "alice");
    }

    #[tokio::test]
    async fn create_rejects_duplicate_username() {
        let store = InMemoryUserStore::new();
        store
            .create("alice", "alice@x.com", "h1")
            .await
            .expect("first create");
        let err = store
            .create("alice", "other@x.com", "h2")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateUsername));
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email() {
        let store = InMemoryUserStore::new();
        store
            .create("alice", "alice@x.com", "h1")
            .await
            .expect("first create");
        let err = store.create("bob", "alice@x.com", "h2").await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[tokio::test]
    async fn usernames_are_case_sensitive() {
        let store = InMemoryUserStore::new();
        store
            .create("alice", "alice@x.com", "h1")
            .await
            .expect("first create");
        store
            .create("Alice", "alice2@x.com", "h2")
            .await
            .expect("different case is a different username");
    }

    #[tokio::test]
    async fn update_last_login_sets_timestamp() {
        let store = InMemoryUserStore::new();
        let user = store
            .create("alice", "alice@x.com", "h1")
            .await
            .expect("create");
        let at = OffsetDateTime::now_utc();
        store.update_last_login(user.id, at).await.expect("update");
        let found = store.find_by_id(user.id).await.expect("find").expect("some");
        assert_eq!(found.last_login, Some(at));
    }

    #[tokio::test]
    async fn update_last_login_missing_user_is_not_found() {
        let store = InMemoryUserStore::new();
        let err = store
            .update_last_login(Uuid::new_v4(), OffsetDateTime::now_utc())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }
}
