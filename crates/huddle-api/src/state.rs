use std::sync::Arc;

use huddle_chat::ChatCore;
use huddle_db::Database;

use crate::storage::BlobStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub chat: Arc<ChatCore>,
    pub blobs: BlobStore,
    pub jwt_secret: String,
    pub max_upload_bytes: usize,
}
