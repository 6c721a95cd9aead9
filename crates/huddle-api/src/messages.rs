use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use huddle_chat::HistoryCursor;
use huddle_db::parse_timestamp;
use huddle_types::api::{Claims, MarkReadResponse, SendMessageRequest};

use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageQuery {
    pub limit: Option<u32>,
    /// Pass the id of the oldest message from the previous page to fetch
    /// older messages. Takes precedence over `before`.
    pub before_id: Option<Uuid>,
    /// Timestamp cursor: only messages strictly older than this.
    pub before: Option<String>,
}

/// GET /rooms/{room_id}/messages
pub async fn list_messages(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let before = match (query.before_id, query.before.as_deref()) {
        (Some(message_id), _) => Some(HistoryCursor::BeforeMessage(message_id)),
        (None, Some(raw)) => Some(HistoryCursor::Before(
            parse_timestamp(raw).ok_or_else(|| ApiError::BadRequest(format!("Invalid cursor: {}", raw)))?,
        )),
        (None, None) => None,
    };

    let chat = state.chat.clone();
    let messages = blocking(move || {
        chat.messages
            .list_messages(room_id, claims.sub, query.limit, before)
    })
    .await?;
    Ok(Json(messages))
}

/// POST /rooms/{room_id}/messages
pub async fn send_message(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let chat = state.chat.clone();
    let message = blocking(move || {
        chat.messages
            .send_message(room_id, claims.sub, &req.content, req.has_media)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// DELETE /rooms/{room_id}/messages/{message_id}
pub async fn delete_message(
    State(state): State<AppState>,
    Path((room_id, message_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let chat = state.chat.clone();
    let deleted = blocking(move || chat.messages.delete_message(room_id, message_id, claims.sub)).await?;
    Ok(Json(deleted))
}

/// POST /messages/{message_id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let chat = state.chat.clone();
    let outcome = blocking(move || chat.receipts.mark_as_read(message_id, claims.sub)).await?;
    Ok(Json(MarkReadResponse { message_id, outcome }))
}
