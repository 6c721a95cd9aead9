use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use huddle_chat::{ChatCore, ChatResult};
use huddle_types::events::{GatewayCommand, GatewayEvent, PresencePayload, PresenceStatus};

use crate::dispatcher::{Dispatcher, Envelope, Route};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Per-connection view of which channels the client has joined. Shared
/// between the send and receive halves.
#[derive(Default)]
struct Subscriptions {
    personal: AtomicBool,
    rooms: RwLock<HashSet<Uuid>>,
}

impl Subscriptions {
    fn rooms(&self) -> std::sync::RwLockReadGuard<'_, HashSet<Uuid>> {
        self.rooms.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns false if the room was already joined.
    fn join(&self, room_id: Uuid) -> bool {
        self.rooms.write().unwrap_or_else(|e| e.into_inner()).insert(room_id)
    }

    fn leave(&self, room_id: Uuid) -> bool {
        self.rooms.write().unwrap_or_else(|e| e.into_inner()).remove(&room_id)
    }

    fn drain(&self) -> Vec<Uuid> {
        self.rooms
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .collect()
    }
}

/// Handle a WebSocket whose bearer token was validated at the HTTP upgrade.
/// Sends Ready, then relays routed events out and client commands in until
/// either side goes away.
pub async fn handle_connection_authenticated(
    socket: WebSocket,
    dispatcher: Dispatcher,
    chat: Arc<ChatCore>,
    user_id: Uuid,
    username: String,
) {
    let (mut sender, mut receiver) = socket.split();

    info!("{} ({}) connected to gateway", username, user_id);

    let ready = GatewayEvent::Ready {
        user_id,
        username: username.clone(),
    };
    match serde_json::to_string(&ready) {
        Ok(text) => {
            if sender.send(Message::Text(text.into())).await.is_err() {
                return;
            }
        }
        Err(e) => {
            error!("Failed to serialize ready event: {}", e);
            return;
        }
    }

    let mut broadcast_rx = dispatcher.subscribe();
    let (direct_tx, mut direct_rx) = mpsc::unbounded_channel::<GatewayEvent>();

    let session = Arc::new(Session::new(dispatcher, chat, user_id, username.clone(), direct_tx));
    let send_session = session.clone();
    let recv_session = session.clone();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Routed events + direct replies -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let envelope = match result {
                        Ok(envelope) => envelope,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} messages", n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    let Some(json) = send_session.route(&envelope).await else {
                        continue;
                    };
                    if sender.send(Message::Text(json.to_string().into())).await.is_err() {
                        break;
                    }
                }
                result = direct_rx.recv() => {
                    let Some(event) = result else { break };
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            error!("Failed to serialize direct event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Client commands
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => recv_session.handle_command(cmd).await,
                    Err(e) => {
                        warn!(
                            "{} ({}) bad command: {} -- raw: {}",
                            recv_session.username,
                            user_id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    session.disconnect().await;
    info!("{} ({}) disconnected from gateway", username, user_id);
}

/// One connection's channel state and command handling, shared by the send
/// and receive halves of the socket.
struct Session {
    dispatcher: Dispatcher,
    chat: Arc<ChatCore>,
    user_id: Uuid,
    username: String,
    subscriptions: Subscriptions,
    direct_tx: mpsc::UnboundedSender<GatewayEvent>,
}

impl Session {
    fn new(
        dispatcher: Dispatcher,
        chat: Arc<ChatCore>,
        user_id: Uuid,
        username: String,
        direct_tx: mpsc::UnboundedSender<GatewayEvent>,
    ) -> Self {
        Self {
            dispatcher,
            chat,
            user_id,
            username,
            subscriptions: Subscriptions::default(),
            direct_tx,
        }
    }

    /// Filter one bus envelope for this connection. A revocation addressed
    /// to this user drops the room channel first, whether or not the
    /// personal channel is joined.
    async fn route(&self, envelope: &Envelope) -> Option<Arc<str>> {
        if let (Route::User(target), Some(room_id)) = (envelope.route, envelope.revokes) {
            if target == self.user_id && self.subscriptions.leave(room_id) {
                leave_room_channel(&self.dispatcher, &self.chat, room_id, self.user_id).await;
                info!("{} ({}) lost access to room channel {}", self.username, self.user_id, room_id);
            }
        }

        let wanted = envelope.is_for(
            self.user_id,
            self.subscriptions.personal.load(Ordering::Acquire),
            &self.subscriptions.rooms(),
        );
        wanted.then(|| envelope.json.clone())
    }

    /// Leave every room channel this connection joined.
    async fn disconnect(&self) {
        for room_id in self.subscriptions.drain() {
            leave_room_channel(&self.dispatcher, &self.chat, room_id, self.user_id).await;
        }
    }

    async fn handle_command(&self, cmd: GatewayCommand) {
        let user_id = self.user_id;

        match cmd {
            GatewayCommand::JoinRoom { user_id: requested } => {
                if requested != user_id {
                    warn!("{} ({}) tried to join the personal channel of {}", self.username, user_id, requested);
                    return;
                }
                self.subscriptions.personal.store(true, Ordering::Release);
                debug!("{} ({}) joined personal channel", self.username, user_id);
            }

            GatewayCommand::JoinChat { room_id } => {
                let chat = self.chat.clone();
                let allowed = run_blocking(move || chat.rooms.ensure_member(room_id, user_id)).await;
                if !allowed {
                    return;
                }
                if !self.subscriptions.join(room_id) {
                    return;
                }

                let (first, present) = self.dispatcher.join_room(room_id, user_id).await;
                info!("{} ({}) joined room channel {}", self.username, user_id, room_id);

                for other in present {
                    let _ = self.direct_tx.send(GatewayEvent::UserOnline(PresencePayload {
                        room_id,
                        user_id: other,
                        status: PresenceStatus::Online,
                        timestamp: Utc::now(),
                    }));
                }
                if first {
                    self.chat.presence.announce_online(room_id, user_id);
                }
            }

            GatewayCommand::LeaveChat { room_id } => {
                if self.subscriptions.leave(room_id) {
                    leave_room_channel(&self.dispatcher, &self.chat, room_id, user_id).await;
                    info!("{} ({}) left room channel {}", self.username, user_id, room_id);
                }
            }

            GatewayCommand::Typing { room_id } => {
                let chat = self.chat.clone();
                run_blocking(move || chat.presence.set_typing(room_id, user_id, true)).await;
            }

            GatewayCommand::StopTyping { room_id } => {
                let chat = self.chat.clone();
                run_blocking(move || chat.presence.set_typing(room_id, user_id, false)).await;
            }

            GatewayCommand::MessageDelivered { room_id, message_id } => {
                let chat = self.chat.clone();
                run_blocking(move || chat.receipts.acknowledge_delivery(room_id, message_id, user_id)).await;
            }
        }
    }
}

async fn leave_room_channel(dispatcher: &Dispatcher, chat: &Arc<ChatCore>, room_id: Uuid, user_id: Uuid) {
    if dispatcher.leave_room(room_id, user_id).await {
        let chat = chat.clone();
        let _ = tokio::task::spawn_blocking(move || chat.presence.announce_offline(room_id, user_id)).await;
    }
}

/// Run a store-bound core call off the async runtime. Rejections are logged
/// and reported as `false`; the client gets no error frame.
async fn run_blocking<T, F>(f: F) -> bool
where
    F: FnOnce() -> ChatResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            warn!("Gateway command rejected: {}", e);
            false
        }
        Err(e) => {
            error!("spawn_blocking join error: {}", e);
            false
        }
    }
}
