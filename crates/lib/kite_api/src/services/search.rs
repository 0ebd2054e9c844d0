//! Search service flow: substring search over posts.

use kite_core::models::post::Post;
use kite_core::store::PostStore;
use tracing::debug;

use crate::error::{AppError, AppResult};

pub const DEFAULT_RESULT_LIMIT: i64 = 20;
pub const MAX_RESULT_LIMIT: i64 = 100;

/// Posts containing `query`, newest first. Returns the trimmed query along
/// with the hits.
pub async fn search_posts(
    store: &dyn PostStore,
    query: Option<&str>,
    limit: Option<i64>,
) -> AppResult<(String, Vec<Post>)> {
    let query = query
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| AppError::Validation("Search query is required".into()))?;
    let limit = limit
        .unwrap_or(DEFAULT_RESULT_LIMIT)
        .clamp(1, MAX_RESULT_LIMIT);

    let hits = store.search_posts(query, limit).await?;
    debug!(query_len = query.len(), hits = hits.len(), "search");
    Ok((query.to_string(), hits))
}
