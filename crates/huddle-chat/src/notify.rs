use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use huddle_db::models::{MemberRow, NotificationRow, UserRow};
use huddle_db::{Database, format_timestamp};
use huddle_types::api::{MessageResponse, NotificationResponse};
use huddle_types::events::{GatewayEvent, NotificationPayload};
use huddle_types::models::NotificationKind;

use crate::convert::{notification_response, parse_id};
use crate::error::{ChatError, ChatResult};
use crate::mention::mentioned_usernames;
use crate::publisher::Publisher;

const PREVIEW_CHARS: usize = 100;

/// Durable per-recipient notifications, pushed on personal channels.
pub struct NotificationFanout {
    db: Arc<Database>,
    publisher: Arc<dyn Publisher>,
}

impl NotificationFanout {
    pub fn new(db: Arc<Database>, publisher: Arc<dyn Publisher>) -> Self {
        Self { db, publisher }
    }

    /// One notification per recipient for a freshly sent message: a mention
    /// if the content names them, a plain message notification otherwise.
    ///
    /// Best-effort. A failed insert is logged and that recipient is skipped.
    /// Returns how many notifications were stored.
    pub fn message_sent(&self, sender: &UserRow, message: &MessageResponse, recipients: &[&MemberRow]) -> usize {
        let sender_name = sender.display_name.as_deref().unwrap_or(&sender.username);
        let mentioned = mentioned_usernames(&message.content);
        let body = preview(&message.content);
        let created_at = format_timestamp(message.created_at);

        let mut stored = 0;
        for member in recipients {
            let kind = if mentioned.contains(&member.username.to_ascii_lowercase()) {
                NotificationKind::Mention
            } else {
                NotificationKind::Message
            };
            let title = match kind {
                NotificationKind::Mention => format!("{} mentioned you", sender_name),
                NotificationKind::Message => format!("New message from {}", sender_name),
            };

            let notification_id = Uuid::new_v4();
            let row = NotificationRow {
                id: notification_id.to_string(),
                user_id: member.user_id.clone(),
                kind: kind.as_str().to_string(),
                title: title.clone(),
                body: body.clone(),
                room_id: Some(message.room_id.to_string()),
                message_id: Some(message.id.to_string()),
                sender_id: Some(sender.id.clone()),
                is_read: false,
                created_at: created_at.clone(),
            };
            if let Err(e) = self.db.insert_notification(&row) {
                warn!("Failed to store notification for {}: {}", member.user_id, e);
                continue;
            }
            stored += 1;

            self.publisher.publish_to_user(
                parse_id("member user_id", &member.user_id),
                GatewayEvent::Notification(NotificationPayload {
                    kind,
                    notification_id,
                    room_id: message.room_id,
                    message_id: message.id,
                    sender_id: message.sender.id,
                    title,
                    body: body.clone(),
                    message: message.clone(),
                }),
            );
        }

        debug!("Message {} produced {} notifications", message.id, stored);
        stored
    }

    pub fn list(&self, user_id: Uuid, limit: u32) -> ChatResult<Vec<NotificationResponse>> {
        let rows = self.db.list_notifications(&user_id.to_string(), limit)?;
        Ok(rows.iter().map(notification_response).collect())
    }

    pub fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> ChatResult<()> {
        if self
            .db
            .mark_notification_read(&notification_id.to_string(), &user_id.to_string())?
        {
            Ok(())
        } else {
            Err(ChatError::not_found("Notification not found"))
        }
    }
}

fn preview(content: &str) -> String {
    if content.is_empty() {
        return "Sent an attachment".to_string();
    }
    content.chars().take(PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(150);
        assert_eq!(preview(&long).chars().count(), PREVIEW_CHARS);
        assert_eq!(preview(""), "Sent an attachment");
        assert_eq!(preview("hi"), "hi");
    }
}
