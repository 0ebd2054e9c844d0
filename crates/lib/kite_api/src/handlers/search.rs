//! Search service handler.

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};

use crate::SearchState;
use crate::error::AppResult;
use crate::models::{SearchHit, SearchQuery, SearchResponse};
use crate::services::search;

/// `GET /?q=` — posts containing `q`, newest first.
pub async fn search_handler(
    State(state): State<SearchState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> AppResult<Json<SearchResponse>> {
    let Query(query) = query?;
    let (query, hits) =
        search::search_posts(state.store.as_ref(), query.q.as_deref(), query.limit).await?;
    Ok(Json(SearchResponse {
        success: true,
        query,
        results: hits.into_iter().map(SearchHit::from).collect(),
    }))
}
