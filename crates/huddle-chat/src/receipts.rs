use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use tracing::{debug, trace};
use uuid::Uuid;

use huddle_db::{Database, format_timestamp, now_timestamp};
use huddle_types::api::MarkReadOutcome;
use huddle_types::events::GatewayEvent;

use crate::convert::parse_id;
use crate::error::{ChatError, ChatResult};
use crate::publisher::Publisher;
use crate::{require_member, require_message, require_room};

/// Read receipts, transport acks and the per-member unread counter.
pub struct ReceiptTracker {
    db: Arc<Database>,
    publisher: Arc<dyn Publisher>,
}

impl ReceiptTracker {
    pub fn new(db: Arc<Database>, publisher: Arc<dyn Publisher>) -> Self {
        Self { db, publisher }
    }

    /// Record that `reader_id` has read a message. Idempotent: the author
    /// reading their own message and repeat reads both succeed without
    /// touching the counter.
    pub fn mark_as_read(&self, message_id: Uuid, reader_id: Uuid) -> ChatResult<MarkReadOutcome> {
        let message = require_message(&self.db, message_id)?;
        let room_id = parse_id("message room_id", &message.room_id);
        require_member(&self.db, room_id, reader_id)?;

        let reader_key = reader_id.to_string();
        if message.sender_id == reader_key {
            return Ok(MarkReadOutcome::OwnMessage);
        }

        let recorded = self
            .db
            .mark_read(&message.id, &message.room_id, &reader_key, &now_timestamp())?;
        if !recorded {
            trace!("{} already read {}", reader_id, message_id);
            return Ok(MarkReadOutcome::AlreadyRead);
        }

        self.publisher.publish_to_room(
            room_id,
            GatewayEvent::MessageRead {
                message_id,
                user_id: reader_id,
            },
        );
        Ok(MarkReadOutcome::Recorded)
    }

    /// Receipt everything unread in the room and zero the counter. Returns
    /// how many messages were newly marked; one event goes out for each.
    pub fn mark_conversation_read(&self, room_id: Uuid, reader_id: Uuid) -> ChatResult<usize> {
        require_room(&self.db, room_id)?;
        require_member(&self.db, room_id, reader_id)?;

        let newly_read = self
            .db
            .mark_room_read(&room_id.to_string(), &reader_id.to_string(), &now_timestamp())?;
        debug!("{} marked {} messages read in {}", reader_id, newly_read.len(), room_id);

        for id in &newly_read {
            self.publisher.publish_to_room(
                room_id,
                GatewayEvent::MessageRead {
                    message_id: parse_id("message id", id),
                    user_id: reader_id,
                },
            );
        }

        Ok(newly_read.len())
    }

    /// A client acknowledged a message event. Returns true on first ack.
    /// Acks from the author, or for a message outside `room_id`, are ignored.
    pub fn acknowledge_delivery(&self, room_id: Uuid, message_id: Uuid, user_id: Uuid) -> ChatResult<bool> {
        let message = require_message(&self.db, message_id)?;
        if message.room_id != room_id.to_string() {
            return Err(ChatError::validation("Message does not belong to this room"));
        }
        require_member(&self.db, room_id, user_id)?;

        let user_key = user_id.to_string();
        if message.sender_id == user_key {
            return Ok(false);
        }

        let delivered_at = Utc::now().trunc_subsecs(6);
        let inserted = self
            .db
            .insert_delivery(&message.id, &user_key, &format_timestamp(delivered_at))?;
        if inserted {
            self.publisher.publish_to_room(
                room_id,
                GatewayEvent::MessageDelivered {
                    message_id,
                    user_id,
                    delivered_at,
                },
            );
        }

        Ok(inserted)
    }
}
