use anyhow::Result;
use rusqlite::{Row, params};

use super::query_by_ids;
use crate::Database;
use crate::models::ReactionRow;

impl Database {
    /// One reaction per (message, user): a second reaction replaces the emoji
    /// of the first and keeps its id.
    pub fn upsert_reaction(
        &self,
        id: &str,
        message_id: &str,
        user_id: &str,
        emoji: &str,
        at: &str,
    ) -> Result<ReactionRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO reactions (id, message_id, user_id, emoji, created_at) VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(message_id, user_id) DO UPDATE SET
                     emoji = excluded.emoji,
                     created_at = excluded.created_at",
                params![id, message_id, user_id, emoji, at],
            )?;

            let row = conn.query_row(
                "SELECT id, message_id, user_id, emoji, created_at FROM reactions
                 WHERE message_id = ?1 AND user_id = ?2",
                [message_id, user_id],
                reaction_from_row,
            )?;
            Ok(row)
        })
    }

    /// Returns true if a reaction was removed.
    pub fn delete_reaction(&self, message_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM reactions WHERE message_id = ?1 AND user_id = ?2",
                [message_id, user_id],
            )?;
            Ok(n > 0)
        })
    }

    /// Batch-fetch reactions for a set of message IDs.
    pub fn reactions_for_messages(&self, message_ids: &[String]) -> Result<Vec<ReactionRow>> {
        self.with_conn(|conn| {
            query_by_ids(
                conn,
                "SELECT id, message_id, user_id, emoji, created_at FROM reactions
                 WHERE message_id IN ({ids}) ORDER BY created_at",
                message_ids,
                reaction_from_row,
            )
        })
    }
}

fn reaction_from_row(row: &Row<'_>) -> rusqlite::Result<ReactionRow> {
    Ok(ReactionRow {
        id: row.get(0)?,
        message_id: row.get(1)?,
        user_id: row.get(2)?,
        emoji: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::now_timestamp;
    use crate::queries::fixtures::{db_with_users, new_id};

    #[test]
    fn second_reaction_replaces_first() {
        let (db, ids) = db_with_users(&["alice", "bob"]);
        let (room, _) = db.find_or_create_direct_room(&new_id(), &ids[0], &ids[1]).unwrap();
        let msg = new_id();
        let at = now_timestamp();
        db.insert_message(&msg, &room.id, &ids[0], "hi", &at).unwrap();

        let first = db.upsert_reaction(&new_id(), &msg, &ids[0], "👍", &at).unwrap();
        let second = db.upsert_reaction(&new_id(), &msg, &ids[0], "❤️", &at).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.emoji, "❤️");

        let all = db.reactions_for_messages(&[msg.clone()]).unwrap();
        assert_eq!(all.len(), 1);

        assert!(db.delete_reaction(&msg, &ids[0]).unwrap());
        assert!(!db.delete_reaction(&msg, &ids[0]).unwrap());
    }
}
