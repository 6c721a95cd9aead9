//! REST surface of the messaging core.
//!
//! Handlers authenticate through [`middleware::require_auth`], then hand the
//! call to `huddle-chat` on a blocking thread and map its errors to HTTP.

pub mod error;
pub mod media;
pub mod messages;
pub mod middleware;
pub mod notifications;
pub mod reactions;
pub mod rooms;
pub mod router;
pub mod state;
pub mod storage;

pub use error::{ApiError, ApiResult};
pub use router::router;
pub use state::{AppState, AppStateInner};

use huddle_chat::ChatResult;
use tracing::error;

/// Run a store-bound core call off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> ChatResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("blocking task failed"))
        })?
        .map_err(ApiError::from)
}
