use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, HeaderMapExt};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::{error, trace};

use huddle_types::api::Claims;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Validate a bearer token issued by the identity provider.
pub fn decode_token(secret: &str, token: &str) -> ApiResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| ApiError::Unauthorized(e.to_string()))
}

/// Extract and validate the JWT, make sure the user exists locally, and
/// hand the claims to the handler through request extensions.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> ApiResult<Response> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))?;

    let claims = decode_token(&state.jwt_secret, bearer.token())?;

    let db = state.db.clone();
    let (id, username, display_name) = (
        claims.sub.to_string(),
        claims.username.clone(),
        claims.display_name.clone(),
    );
    tokio::task::spawn_blocking(move || db.upsert_user(&id, &username, display_name.as_deref()))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("blocking task failed"))
        })??;

    trace!("{} ({}) authenticated", claims.username, claims.sub);
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
