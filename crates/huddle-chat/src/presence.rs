//! Typing indicators and live-channel presence.
//!
//! The in-memory map is authoritative for typing state; the membership row's
//! `is_typing`/`last_seen` are only refreshed as a cache for room listings.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use huddle_db::Database;
use huddle_types::events::{GatewayEvent, PresencePayload, PresenceStatus};

use crate::error::ChatResult;
use crate::publisher::Publisher;
use crate::{require_member, require_room};

pub struct PresenceBroadcaster {
    db: Arc<Database>,
    publisher: Arc<dyn Publisher>,
    ttl: Duration,
    /// (room, user) -> last typing signal
    typing: Mutex<HashMap<(Uuid, Uuid), Instant>>,
}

impl PresenceBroadcaster {
    pub fn new(db: Arc<Database>, publisher: Arc<dyn Publisher>, ttl: Duration) -> Self {
        Self {
            db,
            publisher,
            ttl,
            typing: Mutex::new(HashMap::new()),
        }
    }

    /// Update the typing flag and tell the rest of the room. Each `true`
    /// refreshes the TTL.
    pub fn set_typing(&self, room_id: Uuid, user_id: Uuid, is_typing: bool) -> ChatResult<()> {
        require_room(&self.db, room_id)?;
        require_member(&self.db, room_id, user_id)?;

        {
            let mut typing = self.lock();
            if is_typing {
                typing.insert((room_id, user_id), Instant::now());
            } else {
                typing.remove(&(room_id, user_id));
            }
        }

        self.publish_typing(room_id, user_id, is_typing);
        self.cache(room_id, user_id, is_typing);
        Ok(())
    }

    pub fn is_typing(&self, room_id: Uuid, user_id: Uuid) -> bool {
        self.lock()
            .get(&(room_id, user_id))
            .is_some_and(|since| since.elapsed() < self.ttl)
    }

    /// Clear typing entries older than the TTL and broadcast the stop for
    /// each. Returns how many expired.
    pub fn expire_typing(&self) -> usize {
        let expired: Vec<(Uuid, Uuid)> = {
            let mut typing = self.lock();
            let stale: Vec<_> = typing
                .iter()
                .filter(|(_, since)| since.elapsed() >= self.ttl)
                .map(|(key, _)| *key)
                .collect();
            for key in &stale {
                typing.remove(key);
            }
            stale
        };

        for &(room_id, user_id) in &expired {
            debug!("Typing expired for {} in {}", user_id, room_id);
            self.publish_typing(room_id, user_id, false);
            self.cache(room_id, user_id, false);
        }

        expired.len()
    }

    /// A connection joined the room's live channel.
    pub fn announce_online(&self, room_id: Uuid, user_id: Uuid) {
        self.publish_presence(room_id, user_id, PresenceStatus::Online);
    }

    /// A connection left the room's live channel or dropped. Any typing
    /// state it left behind is cleared along with it.
    pub fn announce_offline(&self, room_id: Uuid, user_id: Uuid) {
        let was_typing = self.lock().remove(&(room_id, user_id)).is_some();
        if was_typing {
            self.publish_typing(room_id, user_id, false);
            self.cache(room_id, user_id, false);
        }
        self.publish_presence(room_id, user_id, PresenceStatus::Offline);
    }

    fn publish_typing(&self, room_id: Uuid, user_id: Uuid, is_typing: bool) {
        self.publisher.publish_to_room_except(
            room_id,
            user_id,
            GatewayEvent::TypingStatus {
                room_id,
                user_id,
                is_typing,
            },
        );
    }

    fn publish_presence(&self, room_id: Uuid, user_id: Uuid, status: PresenceStatus) {
        let payload = PresencePayload {
            room_id,
            user_id,
            status,
            timestamp: Utc::now(),
        };
        let event = match status {
            PresenceStatus::Online => GatewayEvent::UserOnline(payload),
            PresenceStatus::Offline => GatewayEvent::UserOffline(payload),
        };
        self.publisher.publish_to_room_except(room_id, user_id, event);
    }

    fn cache(&self, room_id: Uuid, user_id: Uuid, is_typing: bool) {
        if let Err(e) = self
            .db
            .set_member_typing(&room_id.to_string(), &user_id.to_string(), is_typing)
        {
            warn!("Failed to cache typing state for {} in {}: {}", user_id, room_id, e);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(Uuid, Uuid), Instant>> {
        self.typing.lock().unwrap_or_else(|e| e.into_inner())
    }
}
