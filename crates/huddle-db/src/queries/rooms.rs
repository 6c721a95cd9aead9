use anyhow::{Result, anyhow};
use rusqlite::{Connection, Row, params};

use super::{OptionalExt, query_by_ids};
use crate::models::{MemberRow, RoomRow};
use crate::{Database, now_timestamp};

const ROOM_COLUMNS: &str = "r.id, r.is_group, r.name, r.created_by_id, r.last_message_at, \
                            r.last_message_id, r.is_active, r.created_at";

const MEMBER_COLUMNS: &str = "rm.room_id, rm.user_id, COALESCE(u.username, 'unknown'), \
                              u.display_name, rm.unread_count, rm.is_typing, rm.last_seen, rm.joined_at";

/// Order-independent key for a user pair. Backs the UNIQUE guard on direct rooms.
pub fn direct_key(user_a: &str, user_b: &str) -> String {
    if user_a <= user_b {
        format!("{}:{}", user_a, user_b)
    } else {
        format!("{}:{}", user_b, user_a)
    }
}

impl Database {
    // -- Lookup --

    pub fn get_room(&self, room_id: &str) -> Result<Option<RoomRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM rooms r WHERE r.id = ?1", ROOM_COLUMNS);
            conn.query_row(&sql, [room_id], room_from_row).optional()
        })
    }

    /// Active rooms the user belongs to, most recent activity first.
    pub fn list_rooms_for_user(&self, user_id: &str) -> Result<Vec<RoomRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM rooms r
                 JOIN room_members rm ON rm.room_id = r.id
                 WHERE rm.user_id = ?1 AND r.is_active = 1
                 ORDER BY COALESCE(r.last_message_at, r.created_at) DESC, r.rowid DESC",
                ROOM_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], room_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Creation --

    /// Find-or-create the direct room for a user pair inside one transaction.
    /// The UNIQUE `direct_key` makes a racing second insert a no-op, so both
    /// callers read back the same room. Returns `(room, created)`.
    pub fn find_or_create_direct_room(
        &self,
        new_id: &str,
        user_a: &str,
        user_b: &str,
    ) -> Result<(RoomRow, bool)> {
        let key = direct_key(user_a, user_b);
        let now = now_timestamp();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let inserted = tx.execute(
                "INSERT INTO rooms (id, is_group, direct_key, created_at) VALUES (?1, 0, ?2, ?3)
                 ON CONFLICT(direct_key) DO NOTHING",
                params![new_id, key, now],
            )?;

            if inserted == 1 {
                for user_id in [user_a, user_b] {
                    tx.execute(
                        "INSERT INTO room_members (room_id, user_id, joined_at) VALUES (?1, ?2, ?3)",
                        params![new_id, user_id, now],
                    )?;
                }
            }

            let room = query_room_by_direct_key(&tx, &key)?
                .ok_or_else(|| anyhow!("Direct room missing after insert: {}", key))?;
            tx.commit()?;

            Ok((room, inserted == 1))
        })
    }

    /// Create a group room. Duplicate member ids collapse to one membership.
    pub fn create_group_room(
        &self,
        id: &str,
        name: Option<&str>,
        creator_id: &str,
        member_ids: &[String],
    ) -> Result<RoomRow> {
        let now = now_timestamp();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO rooms (id, is_group, name, created_by_id, created_at) VALUES (?1, 1, ?2, ?3, ?4)",
                params![id, name, creator_id, now],
            )?;

            for user_id in std::iter::once(creator_id).chain(member_ids.iter().map(String::as_str)) {
                tx.execute(
                    "INSERT INTO room_members (room_id, user_id, joined_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(room_id, user_id) DO NOTHING",
                    params![id, user_id, now],
                )?;
            }

            let sql = format!("SELECT {} FROM rooms r WHERE r.id = ?1", ROOM_COLUMNS);
            let room = tx.query_row(&sql, [id], room_from_row)?;
            tx.commit()?;

            Ok(room)
        })
    }

    pub fn touch_last_message(&self, room_id: &str, message_id: &str, at: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE rooms SET last_message_at = ?2, last_message_id = ?3 WHERE id = ?1",
                params![room_id, at, message_id],
            )?;
            Ok(())
        })
    }

    // -- Memberships --

    pub fn get_membership(&self, room_id: &str, user_id: &str) -> Result<Option<MemberRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM room_members rm LEFT JOIN users u ON u.id = rm.user_id
                 WHERE rm.room_id = ?1 AND rm.user_id = ?2",
                MEMBER_COLUMNS
            );
            conn.query_row(&sql, [room_id, user_id], member_from_row).optional()
        })
    }

    pub fn is_member(&self, room_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM room_members WHERE room_id = ?1 AND user_id = ?2",
                    [room_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn list_members(&self, room_id: &str) -> Result<Vec<MemberRow>> {
        self.list_members_for_rooms(&[room_id.to_string()])
    }

    pub fn list_members_for_rooms(&self, room_ids: &[String]) -> Result<Vec<MemberRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM room_members rm LEFT JOIN users u ON u.id = rm.user_id
                 WHERE rm.room_id IN ({{ids}})
                 ORDER BY rm.joined_at, rm.rowid",
                MEMBER_COLUMNS
            );
            query_by_ids(conn, &sql, room_ids, member_from_row)
        })
    }

    /// Atomically bump the counter of every member except the sender.
    /// Returns the number of memberships updated.
    pub fn increment_unread_for_others(&self, room_id: &str, sender_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE room_members SET unread_count = unread_count + 1
                 WHERE room_id = ?1 AND user_id != ?2",
                [room_id, sender_id],
            )?;
            Ok(n)
        })
    }

    /// Atomic decrement, floored at zero.
    pub fn decrement_unread(&self, room_id: &str, user_id: &str) -> Result<()> {
        self.with_conn(|conn| decrement_unread_in(conn, room_id, user_id))
    }

    pub fn reset_unread(&self, room_id: &str, user_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE room_members SET unread_count = 0 WHERE room_id = ?1 AND user_id = ?2",
                [room_id, user_id],
            )?;
            Ok(())
        })
    }

    /// Update the cached typing flag. Returns false if there is no such membership.
    pub fn set_member_typing(&self, room_id: &str, user_id: &str, is_typing: bool) -> Result<bool> {
        let now = now_timestamp();
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE room_members SET is_typing = ?3, last_seen = ?4
                 WHERE room_id = ?1 AND user_id = ?2",
                params![room_id, user_id, is_typing, now],
            )?;
            Ok(n == 1)
        })
    }

    /// Drop a membership. When the last member leaves the room is deactivated.
    /// Returns the remaining member count, or `None` if the user wasn't a member.
    pub fn leave_room(&self, room_id: &str, user_id: &str) -> Result<Option<i64>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let removed = tx.execute(
                "DELETE FROM room_members WHERE room_id = ?1 AND user_id = ?2",
                [room_id, user_id],
            )?;
            if removed == 0 {
                return Ok(None);
            }

            let remaining: i64 = tx.query_row(
                "SELECT COUNT(*) FROM room_members WHERE room_id = ?1",
                [room_id],
                |row| row.get(0),
            )?;
            if remaining == 0 {
                tx.execute("UPDATE rooms SET is_active = 0 WHERE id = ?1", [room_id])?;
            }

            tx.commit()?;
            Ok(Some(remaining))
        })
    }

    // -- Deletion --

    /// Remove a room and everything hanging off it, children first so the
    /// foreign keys hold at every step. Returns the number of messages removed.
    pub fn delete_room_cascade(&self, room_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            for table in ["reactions", "read_receipts", "message_deliveries", "media"] {
                tx.execute(
                    &format!(
                        "DELETE FROM {} WHERE message_id IN (SELECT id FROM messages WHERE room_id = ?1)",
                        table
                    ),
                    [room_id],
                )?;
            }

            let messages = tx.execute("DELETE FROM messages WHERE room_id = ?1", [room_id])?;
            tx.execute("DELETE FROM room_members WHERE room_id = ?1", [room_id])?;
            tx.execute("DELETE FROM rooms WHERE id = ?1", [room_id])?;

            tx.commit()?;
            Ok(messages)
        })
    }
}

pub(crate) fn decrement_unread_in(conn: &Connection, room_id: &str, user_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE room_members SET unread_count = MAX(unread_count - 1, 0)
         WHERE room_id = ?1 AND user_id = ?2",
        [room_id, user_id],
    )?;
    Ok(())
}

fn query_room_by_direct_key(conn: &Connection, key: &str) -> Result<Option<RoomRow>> {
    let sql = format!("SELECT {} FROM rooms r WHERE r.direct_key = ?1", ROOM_COLUMNS);
    conn.query_row(&sql, [key], room_from_row).optional()
}

fn room_from_row(row: &Row<'_>) -> rusqlite::Result<RoomRow> {
    Ok(RoomRow {
        id: row.get(0)?,
        is_group: row.get(1)?,
        name: row.get(2)?,
        created_by_id: row.get(3)?,
        last_message_at: row.get(4)?,
        last_message_id: row.get(5)?,
        is_active: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn member_from_row(row: &Row<'_>) -> rusqlite::Result<MemberRow> {
    Ok(MemberRow {
        room_id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        display_name: row.get(3)?,
        unread_count: row.get(4)?,
        is_typing: row.get(5)?,
        last_seen: row.get(6)?,
        joined_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures::{db_with_users, new_id};

    #[test]
    fn direct_key_is_order_independent() {
        assert_eq!(direct_key("a", "b"), direct_key("b", "a"));
    }

    #[test]
    fn find_or_create_direct_room_is_unique_per_pair() {
        let (db, ids) = db_with_users(&["alice", "bob"]);

        let (first, created) = db.find_or_create_direct_room(&new_id(), &ids[0], &ids[1]).unwrap();
        assert!(created);
        let (second, created) = db.find_or_create_direct_room(&new_id(), &ids[1], &ids[0]).unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(db.list_members(&first.id).unwrap().len(), 2);
    }

    #[test]
    fn unread_counter_never_goes_negative() {
        let (db, ids) = db_with_users(&["alice", "bob"]);
        let (room, _) = db.find_or_create_direct_room(&new_id(), &ids[0], &ids[1]).unwrap();

        assert_eq!(db.increment_unread_for_others(&room.id, &ids[0]).unwrap(), 1);
        db.decrement_unread(&room.id, &ids[1]).unwrap();
        db.decrement_unread(&room.id, &ids[1]).unwrap();

        let member = db.get_membership(&room.id, &ids[1]).unwrap().unwrap();
        assert_eq!(member.unread_count, 0);
    }

    #[test]
    fn last_member_leaving_deactivates_group() {
        let (db, ids) = db_with_users(&["alice", "bob", "carol"]);
        let room = db
            .create_group_room(&new_id(), Some("crew"), &ids[0], &ids[1..].to_vec())
            .unwrap();

        assert_eq!(db.leave_room(&room.id, &ids[1]).unwrap(), Some(2));
        assert_eq!(db.leave_room(&room.id, &ids[1]).unwrap(), None);
        db.leave_room(&room.id, &ids[2]).unwrap();
        assert_eq!(db.leave_room(&room.id, &ids[0]).unwrap(), Some(0));

        assert!(!db.get_room(&room.id).unwrap().unwrap().is_active);
        assert!(db.list_rooms_for_user(&ids[0]).unwrap().is_empty());
    }

    #[test]
    fn group_creation_dedupes_members() {
        let (db, ids) = db_with_users(&["alice", "bob", "carol"]);
        let members = vec![ids[1].clone(), ids[2].clone(), ids[1].clone(), ids[0].clone()];
        let room = db.create_group_room(&new_id(), None, &ids[0], &members).unwrap();
        assert!(room.is_group);
        assert_eq!(room.created_by_id.as_deref(), Some(ids[0].as_str()));
        assert_eq!(db.list_members(&room.id).unwrap().len(), 3);
    }
}
