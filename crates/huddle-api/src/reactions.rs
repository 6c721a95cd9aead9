use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use huddle_types::api::{Claims, ReactionRequest};

use crate::blocking;
use crate::error::ApiResult;
use crate::state::AppState;

/// POST /messages/{message_id}/reactions
///
/// Set or replace the caller's reaction.
pub async fn add_reaction(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReactionRequest>,
) -> ApiResult<impl IntoResponse> {
    let chat = state.chat.clone();
    let reaction = blocking(move || chat.reactions.add_or_replace(message_id, claims.sub, &req.emoji)).await?;
    Ok(Json(reaction))
}

/// DELETE /messages/{message_id}/reactions
///
/// 204 whether or not one existed.
pub async fn remove_reaction(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let chat = state.chat.clone();
    blocking(move || chat.reactions.remove(message_id, claims.sub)).await?;
    Ok(StatusCode::NO_CONTENT)
}
