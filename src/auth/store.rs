use async_trait::async_trait;
use serde::Serialize;
use sqlx::FromRow;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,                           // unique user ID
    pub username: String,                   // unique, case-sensitive
    pub email: String,                      // unique, stored lowercase
    #[serde(skip_serializing)]
    pub password_hash: String,              // Argon2 hash, not exposed in JSON
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,         // creation timestamp
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>, // null until first login
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("username already taken")]
    DuplicateUsername,
    #[error("email already registered")]
    DuplicateEmail,
    #[error("user not found")]
    NotFound,
    #[error("storage unavailable")]
    Unavailable(#[from] sqlx::Error),
}

/// Persistence abstraction over the users table.
///
/// `create` enforces both uniqueness constraints atomically with the
/// insert: two racing registrations with the same username or email
/// produce exactly one success and one `Duplicate*`.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn update_last_login(&self, id: Uuid, at: OffsetDateTime) -> Result<(), StoreError>;
}
