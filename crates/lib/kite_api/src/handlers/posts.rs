//! Post service handlers.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use kite_core::auth::VerifiedIdentity;
use uuid::Uuid;

use crate::PostsState;
use crate::error::AppResult;
use crate::models::{
    CreatePostRequest, ListPostsQuery, PostEnvelope, PostView, UpdatePostRequest,
};
use crate::services::posts;

/// `POST /` — create a post authored by the caller.
pub async fn create_post_handler(
    State(state): State<PostsState>,
    Extension(identity): Extension<VerifiedIdentity>,
    body: Result<Json<CreatePostRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<PostEnvelope>)> {
    let Json(body) = body?;
    let post = posts::create_post(
        state.store.as_ref(),
        identity.user_id(),
        body.content.as_deref(),
        body.media_url,
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(PostEnvelope {
            message: "Post created successfully".into(),
            post: post.into(),
        }),
    ))
}

/// `GET /` — newest posts first.
pub async fn list_posts_handler(
    State(state): State<PostsState>,
    query: Result<Query<ListPostsQuery>, QueryRejection>,
) -> AppResult<Json<Vec<PostView>>> {
    let Query(query) = query?;
    let posts = posts::list_posts(state.store.as_ref(), query.limit, query.offset).await?;
    Ok(Json(posts.into_iter().map(PostView::from).collect()))
}

/// `GET /{id}`
pub async fn get_post_handler(
    State(state): State<PostsState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<PostView>> {
    let Path(id) = id?;
    let post = posts::get_post(state.store.as_ref(), id).await?;
    Ok(Json(post.into()))
}

/// `PATCH /{id}` — author only.
pub async fn update_post_handler(
    State(state): State<PostsState>,
    Extension(identity): Extension<VerifiedIdentity>,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdatePostRequest>, JsonRejection>,
) -> AppResult<Json<PostEnvelope>> {
    let Path(id) = id?;
    let Json(body) = body?;
    let post = posts::update_post(
        state.store.as_ref(),
        id,
        identity.user_id(),
        body.content.as_deref(),
        body.media_url,
    )
    .await?;
    Ok(Json(PostEnvelope {
        message: "Post updated successfully".into(),
        post: post.into(),
    }))
}

/// `DELETE /{id}` — author only.
pub async fn delete_post_handler(
    State(state): State<PostsState>,
    Extension(identity): Extension<VerifiedIdentity>,
    id: Result<Path<Uuid>, PathRejection>,
) -> AppResult<StatusCode> {
    let Path(id) = id?;
    posts::delete_post(state.store.as_ref(), id, identity.user_id()).await?;
    Ok(StatusCode::NO_CONTENT)
}
