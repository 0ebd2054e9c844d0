//! Media service handlers.

use axum::extract::multipart::MultipartError;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use kite_core::auth::VerifiedIdentity;

use crate::MediaState;
use crate::error::{AppError, AppResult};
use crate::models::{MediaView, UploadResponse};
use crate::services::media;

/// Multipart field carrying the upload.
pub const FILE_FIELD: &str = "file";

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(format!(
            "File exceeds {} MiB",
            media::MAX_UPLOAD_BYTES / (1024 * 1024)
        ))
    } else {
        AppError::Validation(e.body_text())
    }
}

/// `POST /upload` — store the multipart field `file` for the caller.
pub async fn upload_handler(
    State(state): State<MediaState>,
    Extension(identity): Extension<VerifiedIdentity>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<UploadResponse>> {
    let mut multipart = multipart?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(multipart_error)?;
        upload = Some((file_name, content_type, data));
        break;
    }
    let (file_name, content_type, data) = upload.ok_or_else(|| {
        AppError::Validation(format!(
            "No file uploaded. Please ensure the field name is \"{FILE_FIELD}\"."
        ))
    })?;

    let stored = media::store_upload(
        state.objects.as_ref(),
        &state.public_url,
        identity.user_id(),
        file_name.as_deref(),
        content_type.as_deref(),
        data.to_vec(),
    )
    .await?;

    Ok(Json(UploadResponse {
        message: "File uploaded successfully".into(),
        media: MediaView {
            url: stored.url.to_string(),
            public_id: stored.public_id,
            format: stored.format,
        },
    }))
}

/// `GET /files/{key}` — serve a stored object.
pub async fn get_file_handler(
    State(state): State<MediaState>,
    Path(key): Path<String>,
) -> AppResult<Response> {
    let (data, content_type) = media::fetch(state.objects.as_ref(), &key).await?;
    Ok((
        [
            (CONTENT_TYPE, content_type),
            (CACHE_CONTROL, "public, max-age=31536000, immutable"),
        ],
        data,
    )
        .into_response())
}
