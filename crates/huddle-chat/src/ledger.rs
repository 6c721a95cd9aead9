use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use huddle_db::{Database, format_timestamp, now_timestamp};
use huddle_types::api::{DeleteMessageResponse, MessageResponse};
use huddle_types::events::GatewayEvent;
use huddle_types::models::DeliveryStatus;

use crate::config::ChatConfig;
use crate::convert::{assemble_messages, user_summary};
use crate::error::{ChatError, ChatResult};
use crate::notify::NotificationFanout;
use crate::publisher::Publisher;
use crate::{require_member, require_message, require_room};

/// Exclusive upper edge of a history page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryCursor {
    /// Messages strictly older than this instant.
    Before(DateTime<Utc>),
    /// Messages that sort before this one, including those sharing its timestamp.
    BeforeMessage(Uuid),
}

/// Appends, pages and tombstones messages.
pub struct MessageLedger {
    db: Arc<Database>,
    publisher: Arc<dyn Publisher>,
    notifications: Arc<NotificationFanout>,
    config: ChatConfig,
}

impl MessageLedger {
    pub fn new(
        db: Arc<Database>,
        publisher: Arc<dyn Publisher>,
        notifications: Arc<NotificationFanout>,
        config: ChatConfig,
    ) -> Self {
        Self {
            db,
            publisher,
            notifications,
            config,
        }
    }

    /// History page in display order (oldest first), ending just before
    /// `before`. Pass the oldest message of the previous page as
    /// [`HistoryCursor::BeforeMessage`] to walk back without gaps.
    pub fn list_messages(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        limit: Option<u32>,
        before: Option<HistoryCursor>,
    ) -> ChatResult<Vec<MessageResponse>> {
        require_room(&self.db, room_id)?;
        require_member(&self.db, room_id, user_id)?;

        let limit = limit
            .unwrap_or(self.config.default_page_limit)
            .clamp(1, self.config.max_page_limit);

        let (cursor_at, cursor_id) = match before {
            None => (None, None),
            Some(HistoryCursor::Before(at)) => (Some(format_timestamp(at)), None),
            Some(HistoryCursor::BeforeMessage(message_id)) => {
                let anchor = require_message(&self.db, message_id)?;
                if anchor.room_id != room_id.to_string() {
                    return Err(ChatError::validation("Message does not belong to this room"));
                }
                (Some(anchor.created_at), Some(anchor.id))
            }
        };

        let mut rows = self.db.get_messages(
            &room_id.to_string(),
            limit,
            cursor_at.as_deref(),
            cursor_id.as_deref(),
        )?;
        rows.reverse();

        Ok(assemble_messages(&self.db, rows)?)
    }

    /// Persist a message and fan it out.
    ///
    /// Only the insert is load-bearing. The room's last-message pointer, the
    /// unread counters and the notifications are applied afterwards and a
    /// failure in any of them is logged, not returned.
    pub fn send_message(
        &self,
        room_id: Uuid,
        sender_id: Uuid,
        content: &str,
        has_media: bool,
    ) -> ChatResult<MessageResponse> {
        let content = content.trim();
        if content.is_empty() && !has_media {
            return Err(ChatError::validation("Message content is required"));
        }

        require_room(&self.db, room_id)?;
        require_member(&self.db, room_id, sender_id)?;

        let sender_key = sender_id.to_string();
        let sender = self
            .db
            .get_user_by_id(&sender_key)?
            .ok_or_else(|| ChatError::not_found("User not found"))?;

        let room_key = room_id.to_string();
        let message_id = Uuid::new_v4();
        let message_key = message_id.to_string();
        // Stored with microsecond precision, so truncate before echoing it back.
        let created_at = Utc::now().trunc_subsecs(6);
        let stamp = format_timestamp(created_at);

        self.db
            .insert_message(&message_key, &room_key, &sender_key, content, &stamp)?;
        debug!("Message {} stored in room {}", message_id, room_id);

        if let Err(e) = self.db.touch_last_message(&room_key, &message_key, &stamp) {
            warn!("Failed to update last message of room {}: {}", room_id, e);
        }
        if let Err(e) = self.db.increment_unread_for_others(&room_key, &sender_key) {
            warn!("Failed to bump unread counters in room {}: {}", room_id, e);
        }

        let message = MessageResponse {
            id: message_id,
            room_id,
            sender: user_summary(&sender),
            content: content.to_string(),
            created_at,
            is_deleted: false,
            deleted_by_id: None,
            media: vec![],
            reactions: vec![],
            read_receipts: vec![],
            status: DeliveryStatus::Sent,
        };

        self.publisher
            .publish_to_room(room_id, GatewayEvent::NewMessage(message.clone()));

        match self.db.list_members(&room_key) {
            Ok(members) => {
                let recipients: Vec<_> = members.iter().filter(|m| m.user_id != sender_key).collect();
                self.notifications.message_sent(&sender, &message, &recipients);
            }
            Err(e) => warn!("Skipping notifications for message {}: {}", message_id, e),
        }

        Ok(message)
    }

    /// Tombstone a message. Repeating the delete is a no-op for the sender.
    pub fn delete_message(
        &self,
        room_id: Uuid,
        message_id: Uuid,
        requester_id: Uuid,
    ) -> ChatResult<DeleteMessageResponse> {
        require_room(&self.db, room_id)?;
        let message = require_message(&self.db, message_id)?;

        if message.room_id != room_id.to_string() {
            return Err(ChatError::validation("Message does not belong to this room"));
        }
        if message.sender_id != requester_id.to_string() {
            return Err(ChatError::forbidden("You can only delete your own messages"));
        }

        let response = DeleteMessageResponse { message_id };
        if message.is_deleted {
            debug!("Message {} already deleted", message_id);
            return Ok(response);
        }

        let removed = self
            .db
            .tombstone_message(&message.id, &message.sender_id, &now_timestamp())?;
        if removed {
            info!("Message {} deleted by {}", message_id, requester_id);
            self.publisher.publish_to_room(
                room_id,
                GatewayEvent::MessageDeleted {
                    message_id,
                    user_id: requester_id,
                },
            );
        }

        Ok(response)
    }
}
