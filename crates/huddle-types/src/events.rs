use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{MediaResponse, MessageResponse};
use crate::models::NotificationKind;

/// Events sent over the WebSocket gateway.
///
/// Serialized as `{"type": "<kebab-name>", "data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum GatewayEvent {
    /// Server confirms the connection is authenticated
    Ready { user_id: Uuid, username: String },

    /// A message was posted; carries the fully enriched message
    NewMessage(MessageResponse),

    MessageRead { message_id: Uuid, user_id: Uuid },

    /// A member's client acknowledged receiving a message
    MessageDelivered {
        message_id: Uuid,
        user_id: Uuid,
        delivered_at: DateTime<Utc>,
    },

    MessageDeleted { message_id: Uuid, user_id: Uuid },

    ReactionAdded {
        message_id: Uuid,
        user_id: Uuid,
        emoji: String,
    },

    ReactionRemoved { message_id: Uuid, user_id: Uuid },

    MediaUploaded(MediaResponse),

    TypingStatus {
        room_id: Uuid,
        user_id: Uuid,
        is_typing: bool,
    },

    /// A connection joined the room's live channel
    UserOnline(PresencePayload),

    /// A connection left the room's live channel (or dropped)
    UserOffline(PresencePayload),

    /// Delivered on personal channels; the room channel no longer exists
    RoomDeleted { room_id: Uuid, deleted_by: Uuid },

    /// Delivered on the leaver's personal channel after leaving a group
    RoomLeft { room_id: Uuid, user_id: Uuid },

    Notification(NotificationPayload),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresencePayload {
    pub room_id: Uuid,
    pub user_id: Uuid,
    pub status: PresenceStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub notification_id: Uuid,
    pub room_id: Uuid,
    pub message_id: Uuid,
    pub sender_id: Uuid,
    pub title: String,
    pub body: String,
    pub message: MessageResponse,
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum GatewayCommand {
    /// Join the personal channel. Must name the authenticated user.
    JoinRoom { user_id: Uuid },

    /// Start receiving a room's channel events
    JoinChat { room_id: Uuid },

    LeaveChat { room_id: Uuid },

    Typing { room_id: Uuid },

    StopTyping { room_id: Uuid },

    /// Transport-level ack that a `new-message` event reached this client
    MessageDelivered { room_id: Uuid, message_id: Uuid },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_uses_kebab_type_and_camel_fields() {
        let event = GatewayEvent::MessageRead {
            message_id: Uuid::nil(),
            user_id: Uuid::nil(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "message-read");
        assert!(json["data"].get("messageId").is_some());
        assert!(json["data"].get("userId").is_some());
    }

    #[test]
    fn room_deleted_payload_shape() {
        let event = GatewayEvent::RoomDeleted {
            room_id: Uuid::nil(),
            deleted_by: Uuid::nil(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "room-deleted");
        assert!(json["data"].get("deletedBy").is_some());
    }

    #[test]
    fn parses_client_commands() {
        let raw = r#"{"type":"join-chat","data":{"roomId":"00000000-0000-0000-0000-000000000000"}}"#;
        let cmd: GatewayCommand = serde_json::from_str(raw).unwrap();
        assert!(matches!(cmd, GatewayCommand::JoinChat { room_id } if room_id.is_nil()));

        let raw = r#"{"type":"stop-typing","data":{"roomId":"00000000-0000-0000-0000-000000000000"}}"#;
        let cmd: GatewayCommand = serde_json::from_str(raw).unwrap();
        assert!(matches!(cmd, GatewayCommand::StopTyping { .. }));
    }
}
