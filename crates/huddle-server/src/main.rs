mod config;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use huddle_api::middleware::decode_token;
use huddle_api::storage::BlobStore;
use huddle_api::{ApiError, AppStateInner};
use huddle_chat::ChatCore;
use huddle_db::Database;
use huddle_gateway::{Dispatcher, handle_connection_authenticated};

use crate::config::{ServerConfig, UPLOAD_URL_PREFIX};

/// How often expired typing indicators are swept.
const TYPING_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone)]
struct GatewayState {
    dispatcher: Dispatcher,
    chat: Arc<ChatCore>,
    db: Arc<Database>,
    jwt_secret: String,
}

#[derive(Debug, Deserialize)]
struct GatewayQuery {
    token: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "huddle=debug,huddle_api=debug,huddle_chat=debug,huddle_gateway=debug,tower_http=debug".into()
            }),
        )
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {:#}", e);
            eprintln!("       Fix your environment or .env file and restart.");
            std::process::exit(1);
        }
    };

    let db = Arc::new(Database::open(&config.db_path)?);
    info!("Database ready at {}", config.db_path.display());

    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let dispatcher = Dispatcher::new();
    let chat = Arc::new(ChatCore::new(
        db.clone(),
        Arc::new(dispatcher.clone()),
        config.chat.clone(),
    ));

    let api_state = Arc::new(AppStateInner {
        db: db.clone(),
        chat: chat.clone(),
        blobs: BlobStore::new(&config.upload_dir, UPLOAD_URL_PREFIX),
        jwt_secret: config.jwt_secret.clone(),
        max_upload_bytes: config.max_upload_bytes,
    });

    let gateway_state = GatewayState {
        dispatcher,
        chat: chat.clone(),
        db,
        jwt_secret: config.jwt_secret.clone(),
    };

    tokio::spawn(run_typing_sweep(chat));

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(gateway_state);

    let app = Router::new()
        .merge(huddle_api::router(api_state))
        .merge(ws_route)
        .nest_service(UPLOAD_URL_PREFIX, ServeDir::new(&config.upload_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Huddle server listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Huddle server stopped");
    Ok(())
}

/// The token rides in the query string because browsers can't set headers
/// on a WebSocket handshake. It is validated before the upgrade.
async fn ws_upgrade(
    State(state): State<GatewayState>,
    Query(query): Query<GatewayQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let claims = decode_token(&state.jwt_secret, &query.token)?;

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

    Ok(ws.on_upgrade(move |socket| {
        handle_connection_authenticated(socket, state.dispatcher, state.chat, claims.sub, claims.username)
    }))
}

/// Clears typing indicators whose client stopped refreshing them.
async fn run_typing_sweep(chat: Arc<ChatCore>) {
    let mut interval = tokio::time::interval(TYPING_SWEEP_INTERVAL);

    loop {
        interval.tick().await;

        let chat = chat.clone();
        match tokio::task::spawn_blocking(move || chat.presence.expire_typing()).await {
            Ok(0) => {}
            Ok(count) => debug!("Expired {} typing indicators", count),
            Err(e) => error!("Typing sweep failed: {}", e),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
