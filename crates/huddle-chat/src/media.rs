use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use tracing::info;
use uuid::Uuid;

use huddle_db::models::{MediaRow, MessageRow};
use huddle_db::{Database, format_timestamp};
use huddle_types::api::MediaResponse;
use huddle_types::events::GatewayEvent;
use huddle_types::models::MediaType;

use crate::convert::media_response;
use crate::error::{ChatError, ChatResult};
use crate::publisher::Publisher;
use crate::{require_member, require_message, require_room};

/// A blob already written to storage, ready to be bound to a message.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub url: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
}

/// Binds uploaded blobs to messages.
pub struct MediaAttachments {
    db: Arc<Database>,
    publisher: Arc<dyn Publisher>,
}

impl MediaAttachments {
    pub fn new(db: Arc<Database>, publisher: Arc<dyn Publisher>) -> Self {
        Self { db, publisher }
    }

    /// Everything `attach` checks, without writing. Lets callers refuse an
    /// upload before the blob hits storage.
    pub fn check_upload(&self, room_id: Uuid, message_id: Uuid, uploader_id: Uuid) -> ChatResult<()> {
        self.target_message(room_id, message_id, uploader_id).map(|_| ())
    }

    pub fn attach(
        &self,
        room_id: Uuid,
        message_id: Uuid,
        uploader_id: Uuid,
        file: NewAttachment,
    ) -> ChatResult<MediaResponse> {
        let message = self.target_message(room_id, message_id, uploader_id)?;

        let media_type = MediaType::from_mime(&file.mime_type);
        let row = MediaRow {
            id: Uuid::new_v4().to_string(),
            message_id: message.id,
            uploader_id: uploader_id.to_string(),
            media_type: media_type.as_str().to_string(),
            url: file.url,
            file_name: file.file_name,
            file_size: file.file_size,
            mime_type: file.mime_type,
            created_at: format_timestamp(Utc::now().trunc_subsecs(6)),
        };
        self.db.insert_media(&row)?;
        info!(
            "{} attached {} ({} bytes, {:?}) to {}",
            uploader_id, row.file_name, row.file_size, media_type, message_id
        );

        let media = media_response(&row);
        self.publisher
            .publish_to_room(room_id, GatewayEvent::MediaUploaded(media.clone()));

        Ok(media)
    }

    fn target_message(&self, room_id: Uuid, message_id: Uuid, uploader_id: Uuid) -> ChatResult<MessageRow> {
        require_room(&self.db, room_id)?;
        require_member(&self.db, room_id, uploader_id)?;

        let message = require_message(&self.db, message_id)?;
        if message.room_id != room_id.to_string() {
            return Err(ChatError::validation("Message does not belong to this room"));
        }
        if message.is_deleted {
            return Err(ChatError::validation("Cannot attach media to a deleted message"));
        }
        Ok(message)
    }
}
