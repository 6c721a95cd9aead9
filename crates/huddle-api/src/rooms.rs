use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use huddle_types::api::{Claims, ConversationReadResponse, CreateGroupRequest, DirectRoomRequest, TypingRequest};

use crate::blocking;
use crate::error::ApiResult;
use crate::state::AppState;

/// GET /rooms
pub async fn list_rooms(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let chat = state.chat.clone();
    let rooms = blocking(move || chat.rooms.list_rooms_for_user(claims.sub)).await?;
    Ok(Json(rooms))
}

/// POST /rooms
///
/// Get or create the direct room with `userId`.
/// 201 when the room was created by this call, 200 otherwise.
pub async fn open_direct_room(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<DirectRoomRequest>,
) -> ApiResult<impl IntoResponse> {
    let chat = state.chat.clone();
    let (room, created) =
        blocking(move || chat.rooms.get_or_create_direct_room(claims.sub, req.user_id)).await?;

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(room)))
}

/// POST /rooms/group
pub async fn create_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateGroupRequest>,
) -> ApiResult<impl IntoResponse> {
    let chat = state.chat.clone();
    let room = blocking(move || {
        chat.rooms
            .create_group_room(claims.sub, req.name.as_deref(), &req.member_ids)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(room)))
}

/// DELETE /rooms/{room_id}
pub async fn delete_room(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let chat = state.chat.clone();
    let deleted = blocking(move || chat.rooms.delete_room(claims.sub, room_id)).await?;
    Ok(Json(deleted))
}

/// POST /rooms/{room_id}/leave
pub async fn leave_room(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let chat = state.chat.clone();
    blocking(move || chat.rooms.leave_room(claims.sub, room_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /rooms/{room_id}/read
pub async fn mark_room_read(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let chat = state.chat.clone();
    let count = blocking(move || chat.receipts.mark_conversation_read(room_id, claims.sub)).await?;
    Ok(Json(ConversationReadResponse { room_id, count }))
}

/// PUT /rooms/{room_id}/typing
pub async fn set_typing(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TypingRequest>,
) -> ApiResult<impl IntoResponse> {
    let chat = state.chat.clone();
    blocking(move || chat.presence.set_typing(room_id, claims.sub, req.is_typing)).await?;
    Ok(StatusCode::NO_CONTENT)
}
