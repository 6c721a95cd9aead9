use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tracing::{error, trace};
use uuid::Uuid;

use huddle_chat::Publisher;
use huddle_types::events::GatewayEvent;

/// Who an envelope is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Connections joined to the room's channel, optionally minus one user.
    Room { room_id: Uuid, except: Option<Uuid> },
    /// A user's personal channel, on every connection they hold.
    User(Uuid),
}

/// An event serialized once and fanned out to every connection, which
/// keeps it or drops it based on the route.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub route: Route,
    pub json: Arc<str>,
    /// Room whose channel the addressed user lost access to.
    pub revokes: Option<Uuid>,
}

impl Envelope {
    pub fn is_for(&self, user_id: Uuid, personal: bool, joined: &HashSet<Uuid>) -> bool {
        match self.route {
            Route::Room { room_id, except } => except != Some(user_id) && joined.contains(&room_id),
            Route::User(target) => personal && target == user_id,
        }
    }
}

/// Routes published events to live connections and tracks who is present
/// in which room channel.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<Envelope>,

    /// room_id -> (user_id -> open connections joined to the room)
    occupancy: RwLock<HashMap<Uuid, HashMap<Uuid, usize>>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                occupancy: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Fire and forget. With no subscribers the event is simply dropped.
    pub fn publish(&self, route: Route, event: &GatewayEvent) {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize gateway event: {}", e);
                return;
            }
        };
        let revokes = match (route, event) {
            (
                Route::User(_),
                GatewayEvent::RoomLeft { room_id, .. } | GatewayEvent::RoomDeleted { room_id, .. },
            ) => Some(*room_id),
            _ => None,
        };

        trace!("Publishing to {:?}: {}", route, json.get(..json.len().min(120)).unwrap_or(&json));
        let _ = self.inner.broadcast_tx.send(Envelope {
            route,
            json: json.into(),
            revokes,
        });
    }

    /// Record a connection joining a room channel. Returns whether this is
    /// the user's first connection in the room, and who else was present.
    pub async fn join_room(&self, room_id: Uuid, user_id: Uuid) -> (bool, Vec<Uuid>) {
        let mut occupancy = self.inner.occupancy.write().await;
        let room = occupancy.entry(room_id).or_default();

        let others = room.keys().copied().filter(|id| *id != user_id).collect();
        let count = room.entry(user_id).or_insert(0);
        *count += 1;

        (*count == 1, others)
    }

    /// Record a connection leaving a room channel. Returns true when that
    /// was the user's last connection in the room.
    pub async fn leave_room(&self, room_id: Uuid, user_id: Uuid) -> bool {
        let mut occupancy = self.inner.occupancy.write().await;
        let Some(room) = occupancy.get_mut(&room_id) else {
            return false;
        };
        let Some(count) = room.get_mut(&user_id) else {
            return false;
        };

        *count -= 1;
        let last = *count == 0;
        if last {
            room.remove(&user_id);
        }
        if room.is_empty() {
            occupancy.remove(&room_id);
        }
        last
    }

    pub async fn occupants(&self, room_id: Uuid) -> Vec<Uuid> {
        self.inner
            .occupancy
            .read()
            .await
            .get(&room_id)
            .map(|room| room.keys().copied().collect())
            .unwrap_or_default()
    }
}

impl Publisher for Dispatcher {
    fn publish_to_room(&self, room_id: Uuid, event: GatewayEvent) {
        self.publish(Route::Room { room_id, except: None }, &event);
    }

    fn publish_to_room_except(&self, room_id: Uuid, except: Uuid, event: GatewayEvent) {
        self.publish(
            Route::Room {
                room_id,
                except: Some(except),
            },
            &event,
        );
    }

    fn publish_to_user(&self, user_id: Uuid, event: GatewayEvent) {
        self.publish(Route::User(user_id), &event);
    }
}
