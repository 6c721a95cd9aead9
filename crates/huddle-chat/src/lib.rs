//! Messaging core: rooms, the message ledger, read receipts, reactions,
//! media binding, typing/presence and notification fan-out.
//!
//! Every component mutates the store first and then publishes through the
//! injected [`Publisher`]. Store access is blocking; async callers should
//! run these methods on a blocking thread.

pub mod config;
pub mod convert;
pub mod directory;
pub mod error;
pub mod ledger;
pub mod media;
pub mod mention;
pub mod notify;
pub mod presence;
pub mod publisher;
pub mod reactions;
pub mod receipts;

use std::sync::Arc;

use uuid::Uuid;

use huddle_db::Database;
use huddle_db::models::{MessageRow, RoomRow};

pub use config::{ChatConfig, GroupDeletePolicy};
pub use directory::RoomDirectory;
pub use error::{ChatError, ChatResult};
pub use ledger::{HistoryCursor, MessageLedger};
pub use media::{MediaAttachments, NewAttachment};
pub use notify::NotificationFanout;
pub use presence::PresenceBroadcaster;
pub use publisher::{Publisher, RecordingPublisher, Target};
pub use reactions::ReactionRegistry;
pub use receipts::ReceiptTracker;

/// All messaging components wired to one store and one publisher.
pub struct ChatCore {
    pub rooms: RoomDirectory,
    pub messages: MessageLedger,
    pub receipts: ReceiptTracker,
    pub reactions: ReactionRegistry,
    pub media: MediaAttachments,
    pub presence: PresenceBroadcaster,
    pub notifications: Arc<NotificationFanout>,
}

impl ChatCore {
    pub fn new(db: Arc<Database>, publisher: Arc<dyn Publisher>, config: ChatConfig) -> Self {
        let notifications = Arc::new(NotificationFanout::new(db.clone(), publisher.clone()));

        Self {
            rooms: RoomDirectory::new(db.clone(), publisher.clone(), config.clone()),
            messages: MessageLedger::new(
                db.clone(),
                publisher.clone(),
                notifications.clone(),
                config.clone(),
            ),
            receipts: ReceiptTracker::new(db.clone(), publisher.clone()),
            reactions: ReactionRegistry::new(db.clone(), publisher.clone()),
            media: MediaAttachments::new(db.clone(), publisher.clone()),
            presence: PresenceBroadcaster::new(db, publisher, config.typing_ttl),
            notifications,
        }
    }
}

// -- Guards shared by the components --

/// Active room or NotFound.
pub(crate) fn require_room(db: &Database, room_id: Uuid) -> ChatResult<RoomRow> {
    db.get_room(&room_id.to_string())?
        .filter(|room| room.is_active)
        .ok_or_else(|| ChatError::not_found("Chat room not found"))
}

pub(crate) fn require_member(db: &Database, room_id: Uuid, user_id: Uuid) -> ChatResult<()> {
    if db.is_member(&room_id.to_string(), &user_id.to_string())? {
        Ok(())
    } else {
        Err(ChatError::forbidden("Not a member of this chat room"))
    }
}

pub(crate) fn require_message(db: &Database, message_id: Uuid) -> ChatResult<MessageRow> {
    db.get_message(&message_id.to_string())?
        .ok_or_else(|| ChatError::not_found("Message not found"))
}
