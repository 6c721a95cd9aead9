use anyhow::Result;
use rusqlite::{Row, params};

use super::{OptionalExt, query_by_ids};
use crate::Database;
use crate::models::MessageRow;

const MESSAGE_COLUMNS: &str = "m.id, m.room_id, m.sender_id, COALESCE(u.username, 'unknown'), \
                               u.display_name, m.content, m.is_deleted, m.deleted_by_id, m.created_at";

impl Database {
    pub fn insert_message(
        &self,
        id: &str,
        room_id: &str,
        sender_id: &str,
        content: &str,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, room_id, sender_id, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, room_id, sender_id, content, created_at],
            )?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM messages m LEFT JOIN users u ON m.sender_id = u.id WHERE m.id = ?1",
                MESSAGE_COLUMNS
            );
            conn.query_row(&sql, [id], message_from_row).optional()
        })
    }

    /// Newest first, ordered by `(created_at, rowid)`.
    ///
    /// `before` is an exclusive `created_at` cursor. With `before_id` set it
    /// becomes a keyset on `(created_at, rowid)` of that message, so a page
    /// boundary inside a run of equal timestamps skips nothing.
    pub fn get_messages(
        &self,
        room_id: &str,
        limit: u32,
        before: Option<&str>,
        before_id: Option<&str>,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            // JOIN users to fetch the sender in a single query (eliminates N+1)
            let sql = format!(
                "SELECT {} FROM messages m
                 LEFT JOIN users u ON m.sender_id = u.id
                 WHERE m.room_id = ?1
                   AND (?2 IS NULL
                        OR m.created_at < ?2
                        OR (m.created_at = ?2 AND m.rowid < (SELECT rowid FROM messages WHERE id = ?4)))
                 ORDER BY m.created_at DESC, m.rowid DESC
                 LIMIT ?3",
                MESSAGE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![room_id, before, limit, before_id], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// The single most recent message of each room (for list previews).
    pub fn latest_messages_for_rooms(&self, room_ids: &[String]) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT * FROM (
                     SELECT {}, ROW_NUMBER() OVER (
                         PARTITION BY m.room_id ORDER BY m.created_at DESC, m.rowid DESC
                     ) AS rn
                     FROM messages m
                     LEFT JOIN users u ON m.sender_id = u.id
                     WHERE m.room_id IN ({{ids}})
                 ) WHERE rn = 1",
                MESSAGE_COLUMNS
            );
            query_by_ids(conn, &sql, room_ids, message_from_row)
        })
    }

    /// Tombstone a message: blank the content, record who deleted it, and
    /// drop its reactions and media. Read receipts stay for audit.
    /// Returns false if the message was already tombstoned.
    pub fn tombstone_message(&self, id: &str, deleted_by: &str, at: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let updated = tx.execute(
                "UPDATE messages SET is_deleted = 1, content = '', deleted_by_id = ?2, deleted_at = ?3
                 WHERE id = ?1 AND is_deleted = 0",
                params![id, deleted_by, at],
            )?;
            if updated == 0 {
                return Ok(false);
            }

            tx.execute("DELETE FROM reactions WHERE message_id = ?1", [id])?;
            tx.execute("DELETE FROM media WHERE message_id = ?1", [id])?;

            tx.commit()?;
            Ok(true)
        })
    }

    /// Derived unread count: messages in the room from someone else that the
    /// user holds no receipt for. Used for reconciliation, not list views.
    pub fn count_unread(&self, room_id: &str, user_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM messages m
                 WHERE m.room_id = ?1 AND m.sender_id != ?2
                   AND NOT EXISTS (
                       SELECT 1 FROM read_receipts rr WHERE rr.message_id = m.id AND rr.user_id = ?2
                   )",
                [room_id, user_id],
                |row| row.get(0),
            )?;
            Ok(n)
        })
    }
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        room_id: row.get(1)?,
        sender_id: row.get(2)?,
        sender_username: row.get(3)?,
        sender_display_name: row.get(4)?,
        content: row.get(5)?,
        is_deleted: row.get(6)?,
        deleted_by_id: row.get(7)?,
        created_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::format_timestamp;
    use crate::queries::fixtures::{db_with_users, new_id};
    use chrono::{Duration, Utc};

    #[test]
    fn pages_backwards_with_cursor() {
        let (db, ids) = db_with_users(&["alice", "bob"]);
        let (room, _) = db.find_or_create_direct_room(&new_id(), &ids[0], &ids[1]).unwrap();

        let base = Utc::now();
        let stamps: Vec<String> = (0..5)
            .map(|i| format_timestamp(base + Duration::milliseconds(i)))
            .collect();
        for (i, at) in stamps.iter().enumerate() {
            db.insert_message(&new_id(), &room.id, &ids[0], &format!("m{}", i), at).unwrap();
        }

        let page = db.get_messages(&room.id, 2, None, None).unwrap();
        assert_eq!(page.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(), ["m4", "m3"]);

        let older = db.get_messages(&room.id, 10, Some(&page[1].created_at), None).unwrap();
        assert_eq!(older.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(), ["m2", "m1", "m0"]);
        assert_eq!(older[0].sender_username, "alice");
    }

    #[test]
    fn identical_timestamps_sort_by_insertion() {
        let (db, ids) = db_with_users(&["alice", "bob"]);
        let (room, _) = db.find_or_create_direct_room(&new_id(), &ids[0], &ids[1]).unwrap();
        let at = format_timestamp(Utc::now());

        db.insert_message(&new_id(), &room.id, &ids[0], "first", &at).unwrap();
        db.insert_message(&new_id(), &room.id, &ids[1], "second", &at).unwrap();

        let rows = db.get_messages(&room.id, 10, None, None).unwrap();
        assert_eq!(rows[0].content, "second");
        assert_eq!(rows[1].content, "first");

        let latest = db.latest_messages_for_rooms(&[room.id.clone()]).unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].content, "second");
    }

    #[test]
    fn keyset_cursor_walks_through_tied_timestamps() {
        let (db, ids) = db_with_users(&["alice", "bob"]);
        let (room, _) = db.find_or_create_direct_room(&new_id(), &ids[0], &ids[1]).unwrap();
        let at = format_timestamp(Utc::now());
        for i in 0..3 {
            db.insert_message(&new_id(), &room.id, &ids[0], &format!("m{}", i), &at).unwrap();
        }

        let mut seen = Vec::new();
        let mut cursor: Option<(String, String)> = None;
        loop {
            let page = db
                .get_messages(
                    &room.id,
                    1,
                    cursor.as_ref().map(|(at, _)| at.as_str()),
                    cursor.as_ref().map(|(_, id)| id.as_str()),
                )
                .unwrap();
            let Some(row) = page.into_iter().next() else { break };
            cursor = Some((row.created_at.clone(), row.id.clone()));
            seen.push(row.content);
        }
        assert_eq!(seen, ["m2", "m1", "m0"]);
    }

    #[test]
    fn tombstone_blanks_content_once() {
        let (db, ids) = db_with_users(&["alice", "bob"]);
        let (room, _) = db.find_or_create_direct_room(&new_id(), &ids[0], &ids[1]).unwrap();
        let msg = new_id();
        let at = format_timestamp(Utc::now());
        db.insert_message(&msg, &room.id, &ids[0], "secret", &at).unwrap();
        db.upsert_reaction(&new_id(), &msg, &ids[1], "👍", &at).unwrap();

        assert!(db.tombstone_message(&msg, &ids[0], &at).unwrap());
        assert!(!db.tombstone_message(&msg, &ids[0], &at).unwrap());

        let row = db.get_message(&msg).unwrap().unwrap();
        assert!(row.is_deleted);
        assert_eq!(row.content, "");
        assert_eq!(row.deleted_by_id.as_deref(), Some(ids[0].as_str()));
        assert!(db.reactions_for_messages(&[msg]).unwrap().is_empty());
    }
}
