use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde_json::json;

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{media, messages, notifications, reactions, rooms};

/// All REST routes. Everything except `/health` requires a bearer token.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/rooms", get(rooms::list_rooms).post(rooms::open_direct_room))
        .route("/rooms/group", post(rooms::create_group))
        .route("/rooms/{room_id}", delete(rooms::delete_room))
        .route("/rooms/{room_id}/leave", post(rooms::leave_room))
        .route("/rooms/{room_id}/read", put(rooms::mark_room_read))
        .route("/rooms/{room_id}/typing", put(rooms::set_typing))
        .route(
            "/rooms/{room_id}/messages",
            get(messages::list_messages).post(messages::send_message),
        )
        .route(
            "/rooms/{room_id}/messages/{message_id}",
            delete(messages::delete_message),
        )
        .route(
            "/rooms/{room_id}/messages/{message_id}/media",
            post(media::upload_media).layer(DefaultBodyLimit::max(state.max_upload_bytes)),
        )
        .route("/messages/{message_id}/read", post(messages::mark_read))
        .route(
            "/messages/{message_id}/reactions",
            post(reactions::add_reaction).delete(reactions::remove_reaction),
        )
        .route("/notifications", get(notifications::list_notifications))
        .route(
            "/notifications/{notification_id}/read",
            post(notifications::mark_notification_read),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
