//! In-memory storage backend.
//!
//! Mirrors the PostgreSQL backend's constraints (unique usernames and emails,
//! unique token hashes, delete-returning takes) under a single lock per
//! operation. Used by tests and `--in-memory` development runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    Backend, ObjectStore, PostStore, RefreshTokenStore, Result, StoreError, UserStore,
    is_valid_object_key,
};
use crate::models::auth::{NewUser, RefreshTokenRecord, User, UserWithPassword};
use crate::models::post::{NewPost, Post, PostChanges};
use crate::uuid::uuidv7;

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, UserWithPassword>,
    /// Keyed by token hash.
    refresh_tokens: HashMap<String, RefreshTokenRecord>,
    posts: HashMap<Uuid, Post>,
    objects: HashMap<String, Vec<u8>>,
}

/// Process-local store implementing every storage trait.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users stored.
    pub async fn user_count(&self) -> usize {
        self.inner.read().await.users.len()
    }

    /// Number of refresh tokens stored for `user_id`.
    pub async fn refresh_token_count(&self, user_id: Uuid) -> usize {
        self.inner
            .read()
            .await
            .refresh_tokens
            .values()
            .filter(|r| r.user_id == user_id)
            .count()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put_object(&self, key: &str, data: Vec<u8>) -> Result<()> {
        if !is_valid_object_key(key) {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        self.inner
            .write()
            .await
            .objects
            .insert(key.to_string(), data);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.read().await.objects.get(key).cloned())
    }
}

fn newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
}

#[async_trait]
impl Backend for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, new_user: NewUser) -> Result<User> {
        let mut inner = self.inner.write().await;
        for existing in inner.users.values() {
            if existing.user.username == new_user.username {
                return Err(StoreError::UniqueViolation("users_username_key".into()));
            }
            if existing.user.email == new_user.email {
                return Err(StoreError::UniqueViolation("users_email_key".into()));
            }
        }
        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username,
            email: new_user.email,
            created_at: Utc::now(),
        };
        inner.users.insert(
            user.id,
            UserWithPassword {
                user: user.clone(),
                password_hash: new_user.password_hash,
            },
        );
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserWithPassword>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.user.email == email)
            .cloned())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(&user_id).map(|u| u.user.clone()))
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn insert_refresh_token(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord> {
        let mut inner = self.inner.write().await;
        if inner.refresh_tokens.contains_key(token_hash) {
            return Err(StoreError::UniqueViolation(
                "refresh_tokens_token_hash_key".into(),
            ));
        }
        let record = RefreshTokenRecord {
            id: uuidv7(),
            user_id,
            expires_at,
            created_at: Utc::now(),
        };
        inner
            .refresh_tokens
            .insert(token_hash.to_string(), record.clone());
        Ok(record)
    }

    async fn take_refresh_token(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>> {
        Ok(self.inner.write().await.refresh_tokens.remove(token_hash))
    }

    async fn delete_refresh_tokens_for_user(&self, user_id: Uuid) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let before = inner.refresh_tokens.len();
        inner.refresh_tokens.retain(|_, r| r.user_id != user_id);
        Ok((before - inner.refresh_tokens.len()) as u64)
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn insert_post(&self, new_post: NewPost) -> Result<Post> {
        let now = Utc::now();
        let post = Post {
            id: uuidv7(),
            user_id: new_post.user_id,
            content: new_post.content,
            media_url: new_post.media_url,
            created_at: now,
            updated_at: now,
        };
        self.inner.write().await.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn find_post(&self, post_id: Uuid) -> Result<Option<Post>> {
        Ok(self.inner.read().await.posts.get(&post_id).cloned())
    }

    async fn list_posts(&self, limit: i64, offset: i64) -> Result<Vec<Post>> {
        let mut posts: Vec<Post> = self.inner.read().await.posts.values().cloned().collect();
        newest_first(&mut posts);
        Ok(posts
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn update_post(
        &self,
        post_id: Uuid,
        owner: Uuid,
        changes: PostChanges,
    ) -> Result<Option<Post>> {
        let mut inner = self.inner.write().await;
        match inner.posts.get_mut(&post_id) {
            Some(post) if post.user_id == owner => {
                changes.apply_to(post, Utc::now());
                Ok(Some(post.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_post(&self, post_id: Uuid, owner: Uuid) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let owned = inner
            .posts
            .get(&post_id)
            .is_some_and(|post| post.user_id == owner);
        if owned {
            inner.posts.remove(&post_id);
        }
        Ok(owned)
    }

    async fn search_posts(&self, query: &str, limit: i64) -> Result<Vec<Post>> {
        let needle = query.to_lowercase();
        let mut posts: Vec<Post> = self
            .inner
            .read()
            .await
            .posts
            .values()
            .filter(|post| post.content.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        newest_first(&mut posts);
        posts.truncate(limit.max(0) as usize);
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: email.into(),
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn duplicate_username_or_email_is_rejected() {
        let store = MemoryStore::new();
        store.insert_user(new_user("alice", "a@x.com")).await.unwrap();

        let err = store
            .insert_user(new_user("alice", "other@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));

        let err = store
            .insert_user(new_user("bob", "a@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));

        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn take_refresh_token_is_single_use() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("alice", "a@x.com")).await.unwrap();
        let expires = Utc::now() + Duration::days(7);
        store
            .insert_refresh_token("h1", user.id, expires)
            .await
            .unwrap();

        let first = store.take_refresh_token("h1").await.unwrap();
        assert_eq!(first.map(|r| r.user_id), Some(user.id));
        assert!(store.take_refresh_token("h1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_for_user_leaves_other_users_alone() {
        let store = MemoryStore::new();
        let alice = store.insert_user(new_user("alice", "a@x.com")).await.unwrap();
        let bob = store.insert_user(new_user("bob", "b@x.com")).await.unwrap();
        let expires = Utc::now() + Duration::days(7);
        store.insert_refresh_token("a1", alice.id, expires).await.unwrap();
        store.insert_refresh_token("a2", alice.id, expires).await.unwrap();
        store.insert_refresh_token("b1", bob.id, expires).await.unwrap();

        assert_eq!(store.delete_refresh_tokens_for_user(alice.id).await.unwrap(), 2);
        assert_eq!(store.refresh_token_count(alice.id).await, 0);
        assert_eq!(store.refresh_token_count(bob.id).await, 1);
    }

    #[tokio::test]
    async fn posts_list_newest_first_with_paging() {
        let store = MemoryStore::new();
        let author = Uuid::new_v4();
        for i in 0..3 {
            store
                .insert_post(NewPost {
                    user_id: author,
                    content: format!("post {i}"),
                    media_url: None,
                })
                .await
                .unwrap();
        }

        let page = store.list_posts(2, 0).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].content, "post 2");
        assert_eq!(page[1].content, "post 1");

        let rest = store.list_posts(10, 2).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].content, "post 0");
    }

    #[tokio::test]
    async fn update_and_delete_require_the_owner() {
        let store = MemoryStore::new();
        let author = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let post = store
            .insert_post(NewPost {
                user_id: author,
                content: "hello".into(),
                media_url: None,
            })
            .await
            .unwrap();

        let changes = PostChanges {
            content: Some("edited".into()),
            media_url: None,
        };
        assert!(
            store
                .update_post(post.id, stranger, changes.clone())
                .await
                .unwrap()
                .is_none()
        );
        let updated = store.update_post(post.id, author, changes).await.unwrap().unwrap();
        assert_eq!(updated.content, "edited");

        assert!(!store.delete_post(post.id, stranger).await.unwrap());
        assert!(store.delete_post(post.id, author).await.unwrap());
        assert!(store.find_post(post.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn search_is_case_insensitive_substring() {
        let store = MemoryStore::new();
        let author = Uuid::new_v4();
        for content in ["Rust is fun", "rusty nails", "gardening"] {
            store
                .insert_post(NewPost {
                    user_id: author,
                    content: content.into(),
                    media_url: None,
                })
                .await
                .unwrap();
        }

        let hits = store.search_posts("RUST", 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(store.search_posts("RUST", 1).await.unwrap().len() == 1);
        assert!(store.search_posts("cooking", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn objects_round_trip_and_reject_bad_keys() {
        let store = MemoryStore::new();
        store.put_object("a.png", vec![1, 2, 3]).await.unwrap();
        assert_eq!(store.get_object("a.png").await.unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(store.get_object("b.png").await.unwrap(), None);

        let err = store.put_object("../a.png", vec![0]).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }
}
