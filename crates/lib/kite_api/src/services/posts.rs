//! Post service flows.

use kite_core::models::post::{NewPost, Post, PostChanges};
use kite_core::store::PostStore;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Trimmed, non-empty post content.
fn validate_content(content: &str) -> AppResult<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::Validation("Post content is required".into()));
    }
    Ok(content.to_string())
}

/// An absolute http(s) URL, or `None` for a blank value.
fn validate_media_url(media_url: Option<String>) -> AppResult<Option<String>> {
    let Some(raw) = media_url.map(|u| u.trim().to_string()) else {
        return Ok(None);
    };
    if raw.is_empty() {
        return Ok(None);
    }
    let url = Url::parse(&raw).map_err(|_| AppError::Validation("Invalid media URL".into()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::Validation("Invalid media URL".into()));
    }
    Ok(Some(url.to_string()))
}

/// Clamp paging parameters to the supported range.
pub fn page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

pub async fn create_post(
    store: &dyn PostStore,
    author: Uuid,
    content: Option<&str>,
    media_url: Option<String>,
) -> AppResult<Post> {
    let content = validate_content(content.unwrap_or_default())?;
    let media_url = validate_media_url(media_url)?;

    let post = store
        .insert_post(NewPost {
            user_id: author,
            content,
            media_url,
        })
        .await?;
    info!(post_id = %post.id, user_id = %author, "post created");
    Ok(post)
}

pub async fn list_posts(
    store: &dyn PostStore,
    limit: Option<i64>,
    offset: Option<i64>,
) -> AppResult<Vec<Post>> {
    let (limit, offset) = page(limit, offset);
    Ok(store.list_posts(limit, offset).await?)
}

pub async fn get_post(store: &dyn PostStore, post_id: Uuid) -> AppResult<Post> {
    store
        .find_post(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".into()))
}

/// Fail with `NotFound` or `Forbidden` unless `caller` owns `post_id`.
async fn require_owner(store: &dyn PostStore, post_id: Uuid, caller: Uuid) -> AppResult<()> {
    let post = get_post(store, post_id).await?;
    if post.user_id != caller {
        debug!(post_id = %post_id, user_id = %caller, "post access denied: not the author");
        return Err(AppError::Forbidden(
            "You can only modify your own posts".into(),
        ));
    }
    Ok(())
}

/// Update a post owned by `caller`.
///
/// An absent field is left unchanged; a blank `media_url` removes the media.
/// Ownership is checked up front for the error kind, and again by the store
/// in the write itself.
pub async fn update_post(
    store: &dyn PostStore,
    post_id: Uuid,
    caller: Uuid,
    content: Option<&str>,
    media_url: Option<String>,
) -> AppResult<Post> {
    let content = content.map(validate_content).transpose()?;
    let media_url = media_url
        .map(|raw| validate_media_url(Some(raw)))
        .transpose()?;

    require_owner(store, post_id, caller).await?;

    let post = store
        .update_post(post_id, caller, PostChanges { content, media_url })
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".into()))?;
    info!(post_id = %post.id, user_id = %caller, "post updated");
    Ok(post)
}

/// Delete a post owned by `caller`.
pub async fn delete_post(store: &dyn PostStore, post_id: Uuid, caller: Uuid) -> AppResult<()> {
    require_owner(store, post_id, caller).await?;

    if !store.delete_post(post_id, caller).await? {
        return Err(AppError::NotFound("Post not found".into()));
    }
    info!(post_id = %post_id, user_id = %caller, "post deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use kite_core::store::MemoryStore;

    use super::*;

    #[test]
    fn paging_is_clamped() {
        assert_eq!(page(None, None), (DEFAULT_PAGE_SIZE, 0));
        assert_eq!(page(Some(0), Some(-5)), (1, 0));
        assert_eq!(page(Some(1_000), Some(20)), (MAX_PAGE_SIZE, 20));
    }

    #[test]
    fn media_url_must_be_http() {
        assert_eq!(validate_media_url(None).unwrap(), None);
        assert_eq!(validate_media_url(Some("  ".into())).unwrap(), None);
        assert!(validate_media_url(Some("https://cdn.example.com/a.png".into())).is_ok());
        assert!(validate_media_url(Some("ftp://example.com/a.png".into())).is_err());
        assert!(validate_media_url(Some("not a url".into())).is_err());
    }

    #[tokio::test]
    async fn empty_content_is_rejected() {
        let store = MemoryStore::new();
        for content in [None, Some(""), Some("   ")] {
            let err = create_post(&store, Uuid::new_v4(), content, None)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn only_the_author_can_modify() {
        let store = MemoryStore::new();
        let author = Uuid::new_v4();
        let other = Uuid::new_v4();
        let post = create_post(&store, author, Some(" hello "), None).await.unwrap();
        assert_eq!(post.content, "hello");

        let err = update_post(&store, post.id, other, Some("hijacked"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        let err = delete_post(&store, post.id, other).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let updated = update_post(&store, post.id, author, Some("edited"), None)
            .await
            .unwrap();
        assert_eq!(updated.content, "edited");
        assert!(updated.updated_at >= post.updated_at);

        delete_post(&store, post.id, author).await.unwrap();
        let err = get_post(&store, post.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn unknown_post_is_not_found() {
        let store = MemoryStore::new();
        let err = update_post(&store, Uuid::new_v4(), Uuid::new_v4(), Some("x"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = delete_post(&store, Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn blank_media_url_removes_the_media() {
        let store = MemoryStore::new();
        let author = Uuid::new_v4();
        let post = create_post(
            &store,
            author,
            Some("hello"),
            Some("https://cdn.example.com/a.png".into()),
        )
        .await
        .unwrap();

        let kept = update_post(&store, post.id, author, Some("edited"), None)
            .await
            .unwrap();
        assert_eq!(kept.media_url.as_deref(), Some("https://cdn.example.com/a.png"));

        let cleared = update_post(&store, post.id, author, None, Some(" ".into()))
            .await
            .unwrap();
        assert_eq!(cleared.media_url, None);
        assert_eq!(cleared.content, "edited");
    }

    #[tokio::test]
    async fn update_rejects_blank_content() {
        let store = MemoryStore::new();
        let author = Uuid::new_v4();
        let post = create_post(&store, author, Some("hello"), None).await.unwrap();
        let err = update_post(&store, post.id, author, Some("  "), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
