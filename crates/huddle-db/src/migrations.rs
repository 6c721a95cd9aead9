use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub const CURRENT_VERSION: i64 = 1;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (chat schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                username        TEXT NOT NULL,
                display_name    TEXT,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE rooms (
                id              TEXT PRIMARY KEY,
                is_group        INTEGER NOT NULL,
                name            TEXT,
                created_by_id   TEXT REFERENCES users(id),
                -- 'lo:hi' user-id pair for direct rooms; NULL for groups
                direct_key      TEXT UNIQUE,
                last_message_at TEXT,
                last_message_id TEXT,
                is_active       INTEGER NOT NULL DEFAULT 1,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE room_members (
                room_id         TEXT NOT NULL REFERENCES rooms(id),
                user_id         TEXT NOT NULL REFERENCES users(id),
                unread_count    INTEGER NOT NULL DEFAULT 0 CHECK (unread_count >= 0),
                is_typing       INTEGER NOT NULL DEFAULT 0,
                last_seen       TEXT,
                joined_at       TEXT NOT NULL,
                PRIMARY KEY (room_id, user_id)
            );

            CREATE INDEX idx_room_members_user ON room_members(user_id);

            CREATE TABLE messages (
                id              TEXT PRIMARY KEY,
                room_id         TEXT NOT NULL REFERENCES rooms(id),
                sender_id       TEXT NOT NULL REFERENCES users(id),
                content         TEXT NOT NULL,
                is_deleted      INTEGER NOT NULL DEFAULT 0,
                deleted_by_id   TEXT,
                deleted_at      TEXT,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_messages_room ON messages(room_id, created_at);

            CREATE TABLE media (
                id              TEXT PRIMARY KEY,
                message_id      TEXT NOT NULL REFERENCES messages(id),
                uploader_id     TEXT NOT NULL REFERENCES users(id),
                media_type      TEXT NOT NULL,
                url             TEXT NOT NULL,
                file_name       TEXT NOT NULL,
                file_size       INTEGER NOT NULL,
                mime_type       TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_media_message ON media(message_id);

            CREATE TABLE reactions (
                id              TEXT PRIMARY KEY,
                message_id      TEXT NOT NULL REFERENCES messages(id),
                user_id         TEXT NOT NULL REFERENCES users(id),
                emoji           TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                UNIQUE(message_id, user_id)
            );

            CREATE TABLE read_receipts (
                message_id      TEXT NOT NULL REFERENCES messages(id),
                user_id         TEXT NOT NULL REFERENCES users(id),
                read_at         TEXT NOT NULL,
                PRIMARY KEY (message_id, user_id)
            );

            CREATE TABLE message_deliveries (
                message_id      TEXT NOT NULL REFERENCES messages(id),
                user_id         TEXT NOT NULL REFERENCES users(id),
                delivered_at    TEXT NOT NULL,
                PRIMARY KEY (message_id, user_id)
            );

            -- No FKs to rooms/messages: notifications outlive deleted rooms.
            CREATE TABLE notifications (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES users(id),
                kind            TEXT NOT NULL,
                title           TEXT NOT NULL,
                body            TEXT NOT NULL,
                room_id         TEXT,
                message_id      TEXT,
                sender_id       TEXT,
                is_read         INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_user ON notifications(user_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
