//! Storage traits and backends.
//!
//! Every cross-request invariant (unique usernames and emails, single-use
//! refresh tokens) is enforced by the backend in a single operation, never by
//! a check followed by a write in the caller.

pub mod local;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::auth::{NewUser, RefreshTokenRecord, User, UserWithPassword};
use crate::models::post::{NewPost, Post, PostChanges};

pub use local::LocalObjectStore;
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors surfaced by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write. Carries the constraint name.
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Liveness check shared by every backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Round-trip to the backend.
    async fn ping(&self) -> Result<()>;
}

/// User persistence.
#[async_trait]
pub trait UserStore: Backend {
    /// Insert a user. Fails with [`StoreError::UniqueViolation`] if the
    /// username or email is taken; no row is written in that case.
    async fn insert_user(&self, new_user: NewUser) -> Result<User>;

    /// Look up a user by normalized email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserWithPassword>>;

    /// Look up a user by id.
    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>>;
}

/// Refresh token persistence.
#[async_trait]
pub trait RefreshTokenStore: Backend {
    /// Store a refresh token hash for `user_id`.
    async fn insert_refresh_token(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord>;

    /// Atomically delete and return the record matching `token_hash`.
    ///
    /// Of any number of concurrent callers presenting the same hash, at most
    /// one receives the record.
    async fn take_refresh_token(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>>;

    /// Delete every refresh token of a user, returning how many were removed.
    async fn delete_refresh_tokens_for_user(&self, user_id: Uuid) -> Result<u64>;
}

/// Everything the identity service needs from storage.
pub trait IdentityStore: UserStore + RefreshTokenStore {}

impl<T: UserStore + RefreshTokenStore> IdentityStore for T {}

/// Post persistence.
#[async_trait]
pub trait PostStore: Backend {
    async fn insert_post(&self, new_post: NewPost) -> Result<Post>;

    async fn find_post(&self, post_id: Uuid) -> Result<Option<Post>>;

    /// Newest first.
    async fn list_posts(&self, limit: i64, offset: i64) -> Result<Vec<Post>>;

    /// Update a post owned by `owner`. `None` if no such post exists for
    /// that owner.
    async fn update_post(
        &self,
        post_id: Uuid,
        owner: Uuid,
        changes: PostChanges,
    ) -> Result<Option<Post>>;

    /// Delete a post owned by `owner`. `false` if nothing was deleted.
    async fn delete_post(&self, post_id: Uuid, owner: Uuid) -> Result<bool>;

    /// Posts whose content contains `query`, case-insensitively. Newest first.
    async fn search_posts(&self, query: &str, limit: i64) -> Result<Vec<Post>>;
}

/// Longest accepted object key.
pub const MAX_OBJECT_KEY_LEN: usize = 128;

/// Object keys are flat file names: `[A-Za-z0-9._-]`, not starting with `.`.
pub fn is_valid_object_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_OBJECT_KEY_LEN
        && !key.starts_with('.')
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_'))
}

/// Uploaded media persistence.
#[async_trait]
pub trait ObjectStore: Backend {
    /// Store `data` under `key`, replacing any previous object. Fails with
    /// [`StoreError::InvalidKey`] for keys rejected by [`is_valid_object_key`].
    async fn put_object(&self, key: &str, data: Vec<u8>) -> Result<()>;

    /// Fetch an object. Invalid keys are reported as absent.
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_keys_are_flat_names() {
        assert!(is_valid_object_key("0192f0c3-7a1b-7c3d-9e4f-000000000000.png"));
        assert!(is_valid_object_key("a_b-c.d"));
        assert!(!is_valid_object_key(""));
        assert!(!is_valid_object_key(".hidden"));
        assert!(!is_valid_object_key("../etc/passwd"));
        assert!(!is_valid_object_key("dir/file.png"));
        assert!(!is_valid_object_key(&"a".repeat(MAX_OBJECT_KEY_LEN + 1)));
    }
}
