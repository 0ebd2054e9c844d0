//! Media upload flows: naming, size limits and public URLs of stored objects.

use kite_core::store::ObjectStore;
use kite_core::uuid::uuidv7;
use tracing::info;
use url::Url;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::routes;

/// Largest accepted file.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Request body limit for uploads: the file plus multipart framing.
pub const MAX_UPLOAD_BODY_BYTES: usize = MAX_UPLOAD_BYTES + 64 * 1024;

const MAX_FORMAT_LEN: usize = 10;
const FALLBACK_FORMAT: &str = "bin";

/// A persisted upload.
#[derive(Debug, Clone)]
pub struct StoredMedia {
    pub public_id: String,
    pub format: String,
    pub key: String,
    pub url: Url,
}

fn clean_format(raw: &str) -> Option<String> {
    let format = raw.trim().to_ascii_lowercase();
    let valid = !format.is_empty()
        && format.len() <= MAX_FORMAT_LEN
        && format.bytes().all(|b| b.is_ascii_alphanumeric());
    valid.then_some(format)
}

/// File format: the file name's extension, else the media subtype of the
/// part's content type, else `bin`.
pub fn media_format(file_name: Option<&str>, content_type: Option<&str>) -> String {
    let from_name = file_name
        .and_then(|name| name.rsplit_once('.'))
        .and_then(|(_, ext)| clean_format(ext));
    let from_type = || {
        content_type
            .and_then(|ct| ct.split(';').next())
            .and_then(|essence| essence.split_once('/'))
            .and_then(|(_, subtype)| clean_format(subtype))
    };
    from_name
        .or_else(from_type)
        .unwrap_or_else(|| FALLBACK_FORMAT.to_string())
}

/// Content type served for a stored format.
pub fn content_type_for(format: &str) -> &'static str {
    match format {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Public URL of the object `key`, under `public_base` (the media service's
/// externally visible root, usually the gateway's `/api/media`).
pub fn file_url(public_base: &Url, key: &str) -> Url {
    let mut url = public_base.clone();
    let base = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{base}{}/{key}", routes::MEDIA_FILES));
    url.set_query(None);
    url
}

/// Validate and persist an uploaded file for `owner`.
pub async fn store_upload(
    objects: &dyn ObjectStore,
    public_base: &Url,
    owner: Uuid,
    file_name: Option<&str>,
    content_type: Option<&str>,
    data: Vec<u8>,
) -> AppResult<StoredMedia> {
    if data.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".into()));
    }
    if data.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::PayloadTooLarge(format!(
            "File exceeds {} MiB",
            MAX_UPLOAD_BYTES / (1024 * 1024)
        )));
    }

    let public_id = uuidv7().to_string();
    let format = media_format(file_name, content_type);
    let key = format!("{public_id}.{format}");
    let size = data.len();

    objects.put_object(&key, data).await?;
    info!(user_id = %owner, key = %key, bytes = size, "media stored");

    Ok(StoredMedia {
        url: file_url(public_base, &key),
        public_id,
        format,
        key,
    })
}

/// Load a stored object with the content type it is served as.
pub async fn fetch(objects: &dyn ObjectStore, key: &str) -> AppResult<(Vec<u8>, &'static str)> {
    let data = objects
        .get_object(key)
        .await?
        .ok_or_else(|| AppError::NotFound("Media not found".into()))?;
    let format = key.rsplit_once('.').map_or("", |(_, ext)| ext);
    Ok((data, content_type_for(format)))
}
