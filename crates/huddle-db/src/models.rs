/// Database row types. These map directly to SQLite rows.
/// Distinct from huddle-types API models to keep the DB layer independent.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct RoomRow {
    pub id: String,
    pub is_group: bool,
    pub name: Option<String>,
    pub created_by_id: Option<String>,
    pub last_message_at: Option<String>,
    pub last_message_id: Option<String>,
    pub is_active: bool,
    pub created_at: String,
}

/// A membership joined with the member's user record.
#[derive(Debug, Clone)]
pub struct MemberRow {
    pub room_id: String,
    pub user_id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub unread_count: i64,
    pub is_typing: bool,
    pub last_seen: Option<String>,
    pub joined_at: String,
}

/// A message joined with its sender's user record.
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub room_id: String,
    pub sender_id: String,
    pub sender_username: String,
    pub sender_display_name: Option<String>,
    pub content: String,
    pub is_deleted: bool,
    pub deleted_by_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct MediaRow {
    pub id: String,
    pub message_id: String,
    pub uploader_id: String,
    pub media_type: String,
    pub url: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct ReactionRow {
    pub id: String,
    pub message_id: String,
    pub user_id: String,
    pub emoji: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct ReceiptRow {
    pub message_id: String,
    pub user_id: String,
    pub read_at: String,
}

#[derive(Debug, Clone)]
pub struct DeliveryRow {
    pub message_id: String,
    pub user_id: String,
    pub delivered_at: String,
}

#[derive(Debug, Clone)]
pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub room_id: Option<String>,
    pub message_id: Option<String>,
    pub sender_id: Option<String>,
    pub is_read: bool,
    pub created_at: String,
}
