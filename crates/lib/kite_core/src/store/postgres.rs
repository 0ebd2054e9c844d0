//! PostgreSQL storage backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{Backend, PostStore, RefreshTokenStore, Result, StoreError, UserStore};
use crate::models::auth::{NewUser, RefreshTokenRecord, User, UserWithPassword};
use crate::models::post::{NewPost, Post, PostChanges};
use crate::uuid::uuidv7;

type UserRow = (Uuid, String, String, DateTime<Utc>);
type TokenRow = (Uuid, Uuid, DateTime<Utc>, DateTime<Utc>);
type PostRow = (Uuid, Uuid, String, Option<String>, DateTime<Utc>, DateTime<Utc>);

const POST_COLUMNS: &str = "id, user_id, content, media_url, created_at, updated_at";

/// Storage backed by a PostgreSQL connection pool.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn user_from_row((id, username, email, created_at): UserRow) -> User {
    User {
        id,
        username,
        email,
        created_at,
    }
}

fn token_from_row((id, user_id, expires_at, created_at): TokenRow) -> RefreshTokenRecord {
    RefreshTokenRecord {
        id,
        user_id,
        expires_at,
        created_at,
    }
}

fn post_from_row((id, user_id, content, media_url, created_at, updated_at): PostRow) -> Post {
    Post {
        id,
        user_id,
        content,
        media_url,
        created_at,
        updated_at,
    }
}

/// Map unique-constraint violations to [`StoreError::UniqueViolation`].
fn map_write_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e
        && db.is_unique_violation()
    {
        return StoreError::UniqueViolation(db.constraint().unwrap_or("unique").to_string());
    }
    StoreError::Sql(e)
}

/// Escape `%`, `_` and `\` for use inside an `ILIKE` pattern.
fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl Backend for PgStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, new_user: NewUser) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) \
             RETURNING id, username, email, created_at",
        )
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;
        Ok(user_from_row(row))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserWithPassword>> {
        let row = sqlx::query_as::<_, (Uuid, String, String, DateTime<Utc>, String)>(
            "SELECT id, username, email, created_at, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(
            |(id, username, email, created_at, password_hash)| UserWithPassword {
                user: user_from_row((id, username, email, created_at)),
                password_hash,
            },
        ))
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }
}

#[async_trait]
impl RefreshTokenStore for PgStore {
    async fn insert_refresh_token(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord> {
        let row = sqlx::query_as::<_, TokenRow>(
            "INSERT INTO refresh_tokens (id, token_hash, user_id, expires_at) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, user_id, expires_at, created_at",
        )
        .bind(uuidv7())
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;
        Ok(token_from_row(row))
    }

    async fn take_refresh_token(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>> {
        let row = sqlx::query_as::<_, TokenRow>(
            "DELETE FROM refresh_tokens WHERE token_hash = $1 \
             RETURNING id, user_id, expires_at, created_at",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(token_from_row))
    }

    async fn delete_refresh_tokens_for_user(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl PostStore for PgStore {
    async fn insert_post(&self, new_post: NewPost) -> Result<Post> {
        let sql = format!(
            "INSERT INTO posts (id, user_id, content, media_url) VALUES ($1, $2, $3, $4) \
             RETURNING {POST_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(uuidv7())
            .bind(new_post.user_id)
            .bind(&new_post.content)
            .bind(&new_post.media_url)
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_error)?;
        Ok(post_from_row(row))
    }

    async fn find_post(&self, post_id: Uuid) -> Result<Option<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(post_from_row))
    }

    async fn list_posts(&self, limit: i64, offset: i64) -> Result<Vec<Post>> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC, id DESC \
             LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(post_from_row).collect())
    }

    async fn update_post(
        &self,
        post_id: Uuid,
        owner: Uuid,
        changes: PostChanges,
    ) -> Result<Option<Post>> {
        let sql = format!(
            "UPDATE posts SET \
               content = COALESCE($3, content), \
               media_url = CASE WHEN $5 THEN $4 ELSE media_url END, \
               updated_at = now() \
             WHERE id = $1 AND user_id = $2 \
             RETURNING {POST_COLUMNS}"
        );
        let set_media_url = changes.media_url.is_some();
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(post_id)
            .bind(owner)
            .bind(changes.content)
            .bind(changes.media_url.flatten())
            .bind(set_media_url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(post_from_row))
    }

    async fn delete_post(&self, post_id: Uuid, owner: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn search_posts(&self, query: &str, limit: i64) -> Result<Vec<Post>> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts \
             WHERE content ILIKE '%' || $1 || '%' ESCAPE '\\' \
             ORDER BY created_at DESC, id DESC LIMIT $2"
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(escape_like(query))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(post_from_row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }
}
