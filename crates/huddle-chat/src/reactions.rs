use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use huddle_db::models::MessageRow;
use huddle_db::{Database, now_timestamp};
use huddle_types::api::ReactionResponse;
use huddle_types::events::GatewayEvent;

use crate::convert::{parse_id, reaction_response};
use crate::error::{ChatError, ChatResult};
use crate::publisher::Publisher;
use crate::{require_member, require_message, require_room};

/// Upper bound on the emoji field. Enough for multi-codepoint sequences.
const MAX_EMOJI_LEN: usize = 32;

pub struct ReactionRegistry {
    db: Arc<Database>,
    publisher: Arc<dyn Publisher>,
}

impl ReactionRegistry {
    pub fn new(db: Arc<Database>, publisher: Arc<dyn Publisher>) -> Self {
        Self { db, publisher }
    }

    /// Set the user's reaction on a message, replacing any earlier one.
    pub fn add_or_replace(&self, message_id: Uuid, user_id: Uuid, emoji: &str) -> ChatResult<ReactionResponse> {
        let emoji = emoji.trim();
        if emoji.is_empty() {
            return Err(ChatError::validation("Emoji is required"));
        }
        if emoji.len() > MAX_EMOJI_LEN {
            return Err(ChatError::validation("Emoji is too long"));
        }

        let (message, room_id) = self.load_for_member(message_id, user_id)?;
        if message.is_deleted {
            return Err(ChatError::validation("Cannot react to a deleted message"));
        }

        let row = self.db.upsert_reaction(
            &Uuid::new_v4().to_string(),
            &message.id,
            &user_id.to_string(),
            emoji,
            &now_timestamp(),
        )?;
        debug!("{} reacted {} on {}", user_id, emoji, message_id);

        self.publisher.publish_to_room(
            room_id,
            GatewayEvent::ReactionAdded {
                message_id,
                user_id,
                emoji: row.emoji.clone(),
            },
        );

        Ok(reaction_response(&row))
    }

    /// Drop the user's reaction. Returns false if there was none, in which
    /// case nothing is published.
    pub fn remove(&self, message_id: Uuid, user_id: Uuid) -> ChatResult<bool> {
        let (message, room_id) = self.load_for_member(message_id, user_id)?;

        let removed = self.db.delete_reaction(&message.id, &user_id.to_string())?;
        if removed {
            self.publisher
                .publish_to_room(room_id, GatewayEvent::ReactionRemoved { message_id, user_id });
        }

        Ok(removed)
    }

    fn load_for_member(&self, message_id: Uuid, user_id: Uuid) -> ChatResult<(MessageRow, Uuid)> {
        let message = require_message(&self.db, message_id)?;
        let room_id = parse_id("message room_id", &message.room_id);
        require_room(&self.db, room_id)?;
        require_member(&self.db, room_id, user_id)?;
        Ok((message, room_id))
    }
}
