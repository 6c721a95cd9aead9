//! Row → wire conversions. Corrupt ids and timestamps are logged and
//! defaulted rather than failing a whole listing.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use huddle_db::Database;
use huddle_db::models::{
    DeliveryRow, MediaRow, MemberRow, MessageRow, NotificationRow, ReactionRow, ReceiptRow, RoomRow,
    UserRow,
};
use huddle_db::parse_timestamp;
use huddle_types::api::{
    MediaResponse, MemberResponse, MessageResponse, NotificationResponse, ReactionResponse,
    ReadReceiptResponse, RoomResponse, UserSummary,
};
use huddle_types::models::{DeliveryStatus, MediaType, NotificationKind};

pub(crate) fn parse_id(what: &str, raw: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

pub(crate) fn parse_opt_id(what: &str, raw: Option<&str>) -> Option<Uuid> {
    raw.map(|r| parse_id(what, r))
}

pub(crate) fn parse_time(what: &str, raw: &str) -> DateTime<Utc> {
    parse_timestamp(raw).unwrap_or_else(|| {
        warn!("Corrupt {} '{}'", what, raw);
        DateTime::default()
    })
}

/// Status of a message from its author's point of view. Only other members'
/// receipts and acks count.
pub fn delivery_status(sender_id: &str, receipts: &[&ReceiptRow], deliveries: &[&DeliveryRow]) -> DeliveryStatus {
    let read = receipts.iter().any(|r| r.user_id != sender_id);
    let delivered = deliveries.iter().any(|d| d.user_id != sender_id);
    DeliveryStatus::derive(read, delivered)
}

pub(crate) fn user_summary(row: &UserRow) -> UserSummary {
    UserSummary {
        id: parse_id("user id", &row.id),
        username: row.username.clone(),
        display_name: row.display_name.clone(),
    }
}

pub(crate) fn member_response(row: &MemberRow) -> MemberResponse {
    MemberResponse {
        user: UserSummary {
            id: parse_id("member user_id", &row.user_id),
            username: row.username.clone(),
            display_name: row.display_name.clone(),
        },
        unread_count: row.unread_count,
        is_typing: row.is_typing,
        last_seen: row.last_seen.as_deref().map(|t| parse_time("last_seen", t)),
        joined_at: parse_time("joined_at", &row.joined_at),
    }
}

pub(crate) fn media_response(row: &MediaRow) -> MediaResponse {
    MediaResponse {
        id: parse_id("media id", &row.id),
        message_id: parse_id("media message_id", &row.message_id),
        media_type: MediaType::from_stored(&row.media_type),
        url: row.url.clone(),
        file_name: row.file_name.clone(),
        file_size: row.file_size,
        mime_type: row.mime_type.clone(),
        created_at: parse_time("media created_at", &row.created_at),
    }
}

pub(crate) fn reaction_response(row: &ReactionRow) -> ReactionResponse {
    ReactionResponse {
        id: parse_id("reaction id", &row.id),
        message_id: parse_id("reaction message_id", &row.message_id),
        user_id: parse_id("reaction user_id", &row.user_id),
        emoji: row.emoji.clone(),
        created_at: parse_time("reaction created_at", &row.created_at),
    }
}

pub(crate) fn notification_response(row: &NotificationRow) -> NotificationResponse {
    NotificationResponse {
        id: parse_id("notification id", &row.id),
        kind: NotificationKind::from_stored(&row.kind),
        title: row.title.clone(),
        body: row.body.clone(),
        room_id: parse_opt_id("notification room_id", row.room_id.as_deref()),
        message_id: parse_opt_id("notification message_id", row.message_id.as_deref()),
        sender_id: parse_opt_id("notification sender_id", row.sender_id.as_deref()),
        is_read: row.is_read,
        created_at: parse_time("notification created_at", &row.created_at),
    }
}

pub(crate) fn room_response(
    room: &RoomRow,
    members: Vec<MemberResponse>,
    messages: Vec<MessageResponse>,
    unread_count: i64,
) -> RoomResponse {
    RoomResponse {
        id: parse_id("room id", &room.id),
        is_group: room.is_group,
        name: room.name.clone(),
        created_by_id: parse_opt_id("room created_by_id", room.created_by_id.as_deref()),
        last_message_at: room.last_message_at.as_deref().map(|t| parse_time("last_message_at", t)),
        last_message_id: parse_opt_id("room last_message_id", room.last_message_id.as_deref()),
        is_active: room.is_active,
        created_at: parse_time("room created_at", &room.created_at),
        members,
        messages,
        unread_count,
    }
}

/// Enrich message rows with media, reactions, receipts and delivery status.
/// Four batch queries regardless of how many messages. Input order is kept.
pub(crate) fn assemble_messages(db: &Database, rows: Vec<MessageRow>) -> anyhow::Result<Vec<MessageResponse>> {
    if rows.is_empty() {
        return Ok(vec![]);
    }

    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let media_by_msg = group_by_message(db.media_for_messages(&ids)?, |m| &m.message_id);
    let reactions_by_msg = group_by_message(db.reactions_for_messages(&ids)?, |r| &r.message_id);
    let receipts_by_msg = group_by_message(db.receipts_for_messages(&ids)?, |r| &r.message_id);
    let deliveries_by_msg = group_by_message(db.deliveries_for_messages(&ids)?, |d| &d.message_id);

    let messages = rows
        .into_iter()
        .map(|row| {
            let media = media_by_msg.get(&row.id).map(Vec::as_slice).unwrap_or_default();
            let reactions = reactions_by_msg.get(&row.id).map(Vec::as_slice).unwrap_or_default();
            let receipts: Vec<&ReceiptRow> = receipts_by_msg
                .get(&row.id)
                .map(|v| v.iter().collect())
                .unwrap_or_default();
            let deliveries: Vec<&DeliveryRow> = deliveries_by_msg
                .get(&row.id)
                .map(|v| v.iter().collect())
                .unwrap_or_default();

            MessageResponse {
                id: parse_id("message id", &row.id),
                room_id: parse_id("message room_id", &row.room_id),
                sender: UserSummary {
                    id: parse_id("message sender_id", &row.sender_id),
                    username: row.sender_username.clone(),
                    display_name: row.sender_display_name.clone(),
                },
                content: row.content.clone(),
                created_at: parse_time("message created_at", &row.created_at),
                is_deleted: row.is_deleted,
                deleted_by_id: parse_opt_id("message deleted_by_id", row.deleted_by_id.as_deref()),
                media: media.iter().map(media_response).collect(),
                reactions: reactions.iter().map(reaction_response).collect(),
                read_receipts: receipts
                    .iter()
                    .map(|r| ReadReceiptResponse {
                        user_id: parse_id("receipt user_id", &r.user_id),
                        read_at: parse_time("receipt read_at", &r.read_at),
                    })
                    .collect(),
                status: delivery_status(&row.sender_id, &receipts, &deliveries),
            }
        })
        .collect();

    Ok(messages)
}

fn group_by_message<T, F>(rows: Vec<T>, key: F) -> HashMap<String, Vec<T>>
where
    F: Fn(&T) -> &String,
{
    let mut map: HashMap<String, Vec<T>> = HashMap::new();
    for row in rows {
        map.entry(key(&row).clone()).or_default().push(row);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt(user: &str) -> ReceiptRow {
        ReceiptRow {
            message_id: "m".into(),
            user_id: user.into(),
            read_at: "2024-01-01 00:00:00".into(),
        }
    }

    fn delivery(user: &str) -> DeliveryRow {
        DeliveryRow {
            message_id: "m".into(),
            user_id: user.into(),
            delivered_at: "2024-01-01 00:00:00".into(),
        }
    }

    #[test]
    fn sender_receipts_do_not_count() {
        let own = receipt("s");
        let own_ack = delivery("s");
        assert_eq!(delivery_status("s", &[&own], &[&own_ack]), DeliveryStatus::Sent);
    }

    #[test]
    fn ack_then_read() {
        let ack = delivery("b");
        let read = receipt("b");
        assert_eq!(delivery_status("s", &[], &[&ack]), DeliveryStatus::Delivered);
        assert_eq!(delivery_status("s", &[&read], &[]), DeliveryStatus::Read);
        assert_eq!(delivery_status("s", &[&read], &[&ack]), DeliveryStatus::Read);
    }

    #[test]
    fn corrupt_values_default() {
        assert_eq!(parse_id("x", "not-a-uuid"), Uuid::default());
        assert_eq!(parse_time("x", "nope"), DateTime::<Utc>::default());
    }
}
