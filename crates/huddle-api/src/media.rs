use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use huddle_chat::NewAttachment;
use huddle_types::api::Claims;

use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Original file name supplied by the client.
pub const FILE_NAME_HEADER: &str = "x-file-name";

const DEFAULT_MIME: &str = "application/octet-stream";

/// POST /rooms/{room_id}/messages/{message_id}/media
///
/// Raw request body; `Content-Type` is the file's MIME type and
/// `X-File-Name` its original name. Authorization is checked before the
/// blob is written, and the blob is removed again if binding it fails.
pub async fn upload_media(
    State(state): State<AppState>,
    Path((room_id, message_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    bytes: Bytes,
) -> ApiResult<impl IntoResponse> {
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("No file uploaded".into()));
    }
    if bytes.len() > state.max_upload_bytes {
        return Err(ApiError::PayloadTooLarge {
            limit: state.max_upload_bytes,
        });
    }

    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or_default().trim())
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_MIME)
        .to_string();
    let file_name = headers
        .get(FILE_NAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("upload")
        .to_string();

    let chat = state.chat.clone();
    let uploader = claims.sub;
    blocking(move || chat.media.check_upload(room_id, message_id, uploader)).await?;

    let blob = state.blobs.save(&file_name, &bytes).await?;

    let attachment = NewAttachment {
        url: blob.url.clone(),
        file_name,
        file_size: bytes.len() as i64,
        mime_type,
    };
    let chat = state.chat.clone();
    let media = match blocking(move || chat.media.attach(room_id, message_id, uploader, attachment)).await {
        Ok(media) => media,
        Err(e) => {
            state.blobs.remove(&blob.stored_name).await;
            return Err(e);
        }
    };

    info!("{} uploaded {} to message {}", claims.username, blob.url, message_id);
    Ok((StatusCode::CREATED, Json(media)))
}
