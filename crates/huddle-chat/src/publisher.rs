use std::sync::Mutex;

use uuid::Uuid;

use huddle_types::events::GatewayEvent;

/// Outbound side of the realtime bus. Delivery is fire-and-forget:
/// at-most-once, no retry, nothing persisted for offline clients.
pub trait Publisher: Send + Sync {
    /// Everyone currently joined to the room's channel.
    fn publish_to_room(&self, room_id: Uuid, event: GatewayEvent);

    /// The room's channel minus one user (typically the originator).
    fn publish_to_room_except(&self, room_id: Uuid, except: Uuid, event: GatewayEvent);

    /// A user's personal channel.
    fn publish_to_user(&self, user_id: Uuid, event: GatewayEvent);
}

/// Where a published event was addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Room { room_id: Uuid, except: Option<Uuid> },
    User(Uuid),
}

/// Publisher that keeps everything it is handed. Used by tests and by tools
/// that run the core without a live gateway.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<(Target, GatewayEvent)>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<(Target, GatewayEvent)> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(|e| e.into_inner()))
    }

    fn push(&self, target: Target, event: GatewayEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((target, event));
    }
}

impl Publisher for RecordingPublisher {
    fn publish_to_room(&self, room_id: Uuid, event: GatewayEvent) {
        self.push(Target::Room { room_id, except: None }, event);
    }

    fn publish_to_room_except(&self, room_id: Uuid, except: Uuid, event: GatewayEvent) {
        self.push(Target::Room { room_id, except: Some(except) }, event);
    }

    fn publish_to_user(&self, user_id: Uuid, event: GatewayEvent) {
        self.push(Target::User(user_id), event);
    }
}
