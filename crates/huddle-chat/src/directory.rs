use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use huddle_db::Database;
use huddle_db::models::MemberRow;
use huddle_types::api::{DeleteRoomResponse, MemberResponse, MessageResponse, RoomResponse};
use huddle_types::events::GatewayEvent;

use crate::config::{ChatConfig, GroupDeletePolicy};
use crate::convert::{assemble_messages, member_response, parse_id, room_response};
use crate::error::{ChatError, ChatResult};
use crate::publisher::Publisher;
use crate::{require_member, require_room};

/// Resolves and creates rooms, lists them per user, and tears them down.
pub struct RoomDirectory {
    db: Arc<Database>,
    publisher: Arc<dyn Publisher>,
    config: ChatConfig,
}

impl RoomDirectory {
    pub fn new(db: Arc<Database>, publisher: Arc<dyn Publisher>, config: ChatConfig) -> Self {
        Self { db, publisher, config }
    }

    /// Returns the direct room for the pair, creating it on first contact.
    /// The bool is true when the room was created by this call.
    ///
    /// An existing room comes back with its most recent messages (newest
    /// first) and an unread count derived from receipts, which doubles as a
    /// reconciliation of the stored counter.
    pub fn get_or_create_direct_room(&self, current: Uuid, target: Uuid) -> ChatResult<(RoomResponse, bool)> {
        if current == target {
            return Err(ChatError::validation("Cannot chat with yourself"));
        }

        let target_key = target.to_string();
        if self.db.get_user_by_id(&target_key)?.is_none() {
            return Err(ChatError::not_found("User not found"));
        }

        let current_key = current.to_string();
        let (room, created) = self.db.find_or_create_direct_room(
            &Uuid::new_v4().to_string(),
            &current_key,
            &target_key,
        )?;
        let members = self.db.list_members(&room.id)?.iter().map(member_response).collect();

        if created {
            info!("Direct room {} created for {} and {}", room.id, current, target);
            return Ok((room_response(&room, members, vec![], 0), true));
        }

        debug!("Direct room {} found for {} and {}", room.id, current, target);
        let rows = self.db.get_messages(&room.id, self.config.history_preview_limit, None, None)?;
        let messages = assemble_messages(&self.db, rows)?;
        let unread = self.db.count_unread(&room.id, &current_key)?;

        Ok((room_response(&room, members, messages, unread), false))
    }

    /// Group of the caller plus at least two other existing users.
    pub fn create_group_room(
        &self,
        current: Uuid,
        name: Option<&str>,
        member_ids: &[Uuid],
    ) -> ChatResult<RoomResponse> {
        let others: BTreeSet<Uuid> = member_ids.iter().copied().filter(|id| *id != current).collect();
        if others.len() < 2 {
            return Err(ChatError::validation("Group chat requires at least 2 other members"));
        }

        let other_keys: Vec<String> = others.iter().map(Uuid::to_string).collect();
        let missing = self.db.missing_user_ids(&other_keys)?;
        if !missing.is_empty() {
            debug!("Group creation rejected, unknown users: {:?}", missing);
            return Err(ChatError::not_found("Some users not found"));
        }

        let name = name.map(str::trim).filter(|n| !n.is_empty());
        let room = self.db.create_group_room(
            &Uuid::new_v4().to_string(),
            name,
            &current.to_string(),
            &other_keys,
        )?;
        info!("Group room {} created by {} with {} members", room.id, current, others.len() + 1);

        let members = self.db.list_members(&room.id)?.iter().map(member_response).collect();
        Ok(room_response(&room, members, vec![], 0))
    }

    /// Active rooms for the user, newest activity first. Each carries its
    /// latest message as a preview and the stored unread counter.
    pub fn list_rooms_for_user(&self, user_id: Uuid) -> ChatResult<Vec<RoomResponse>> {
        let user_key = user_id.to_string();
        let rooms = self.db.list_rooms_for_user(&user_key)?;
        if rooms.is_empty() {
            return Ok(vec![]);
        }

        let room_ids: Vec<String> = rooms.iter().map(|r| r.id.clone()).collect();

        let mut members_by_room: HashMap<String, Vec<MemberRow>> = HashMap::new();
        for member in self.db.list_members_for_rooms(&room_ids)? {
            members_by_room.entry(member.room_id.clone()).or_default().push(member);
        }

        let mut preview_by_room: HashMap<Uuid, MessageResponse> = HashMap::new();
        let previews = assemble_messages(&self.db, self.db.latest_messages_for_rooms(&room_ids)?)?;
        for message in previews {
            preview_by_room.insert(message.room_id, message);
        }

        let result = rooms
            .iter()
            .map(|room| {
                let members = members_by_room.get(&room.id).map(Vec::as_slice).unwrap_or_default();
                let unread = members
                    .iter()
                    .find(|m| m.user_id == user_key)
                    .map(|m| m.unread_count)
                    .unwrap_or(0);
                let members: Vec<MemberResponse> = members.iter().map(member_response).collect();
                let preview = preview_by_room
                    .remove(&parse_id("room id", &room.id))
                    .into_iter()
                    .collect();

                room_response(room, members, preview, unread)
            })
            .collect();

        Ok(result)
    }

    /// Hard-delete a room and everything in it, then tell every former
    /// member on their personal channel.
    pub fn delete_room(&self, user_id: Uuid, room_id: Uuid) -> ChatResult<DeleteRoomResponse> {
        let room = require_room(&self.db, room_id)?;
        let members = self.db.list_members(&room.id)?;

        let user_key = user_id.to_string();
        if !members.iter().any(|m| m.user_id == user_key) {
            return Err(ChatError::forbidden("You are not a member of this chat room"));
        }

        if room.is_group && self.config.group_delete_policy == GroupDeletePolicy::CreatorOnly {
            if let Some(creator) = room.created_by_id.as_deref() {
                if creator != user_key {
                    return Err(ChatError::forbidden("Only the group creator can delete this chat room"));
                }
            }
        }

        let messages_deleted = self.db.delete_room_cascade(&room.id)?;
        info!("Room {} deleted by {} ({} messages)", room.id, user_id, messages_deleted);

        for member in &members {
            self.publisher.publish_to_user(
                parse_id("member user_id", &member.user_id),
                GatewayEvent::RoomDeleted {
                    room_id,
                    deleted_by: user_id,
                },
            );
        }

        Ok(DeleteRoomResponse {
            room_id,
            messages_deleted,
        })
    }

    /// Leave a group. The room is soft-removed once nobody is left.
    pub fn leave_room(&self, user_id: Uuid, room_id: Uuid) -> ChatResult<()> {
        let room = require_room(&self.db, room_id)?;
        if !room.is_group {
            return Err(ChatError::validation("Direct rooms cannot be left; delete the room instead"));
        }

        match self.db.leave_room(&room.id, &user_id.to_string())? {
            None => return Err(ChatError::forbidden("Not a member of this chat room")),
            Some(0) => info!("Room {} deactivated, last member {} left", room.id, user_id),
            Some(remaining) => debug!("{} left room {} ({} remaining)", user_id, room.id, remaining),
        }

        // Live connections of the leaver drop the room channel on this
        self.publisher
            .publish_to_user(user_id, GatewayEvent::RoomLeft { room_id, user_id });
        Ok(())
    }

    /// Membership check for live-channel joins.
    pub fn ensure_member(&self, room_id: Uuid, user_id: Uuid) -> ChatResult<()> {
        require_room(&self.db, room_id)?;
        require_member(&self.db, room_id, user_id)
    }
}
