use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use huddle_types::api::Claims;

use crate::blocking;
use crate::error::ApiResult;
use crate::state::AppState;

const INBOX_LIMIT: u32 = 50;

/// GET /notifications
///
/// Most recent first.
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let chat = state.chat.clone();
    let notifications = blocking(move || chat.notifications.list(claims.sub, INBOX_LIMIT)).await?;
    Ok(Json(notifications))
}

/// POST /notifications/{notification_id}/read
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let chat = state.chat.clone();
    blocking(move || chat.notifications.mark_read(claims.sub, notification_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
