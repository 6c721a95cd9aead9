#![allow(dead_code)]

use std::sync::Arc;

use uuid::Uuid;

use huddle_chat::{ChatConfig, ChatCore, RecordingPublisher};
use huddle_db::Database;

pub struct Harness {
    pub db: Arc<Database>,
    pub events: Arc<RecordingPublisher>,
    pub chat: ChatCore,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ChatConfig::default())
    }

    pub fn with_config(config: ChatConfig) -> Self {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let events = Arc::new(RecordingPublisher::new());
        let chat = ChatCore::new(db.clone(), events.clone(), config);
        Self { db, events, chat }
    }

    pub fn user(&self, username: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.db.upsert_user(&id.to_string(), username, None).unwrap();
        id
    }

    pub fn unread(&self, room_id: Uuid, user_id: Uuid) -> i64 {
        self.db
            .get_membership(&room_id.to_string(), &user_id.to_string())
            .unwrap()
            .expect("membership")
            .unread_count
    }

    /// Direct room between two fresh users, with the event log cleared.
    pub fn direct_pair(&self) -> (Uuid, Uuid, Uuid) {
        let a = self.user("alice");
        let b = self.user("bob");
        let (room, _) = self.chat.rooms.get_or_create_direct_room(a, b).unwrap();
        self.events.take();
        (room.id, a, b)
    }
}
