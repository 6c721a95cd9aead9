use anyhow::Result;
use rusqlite::{Row, params};

use super::query_by_ids;
use super::rooms::decrement_unread_in;
use crate::Database;
use crate::models::{DeliveryRow, ReceiptRow};

impl Database {
    /// Record a receipt and decrement the reader's counter in one transaction.
    /// Returns false (and changes nothing) if the receipt already existed.
    pub fn mark_read(&self, message_id: &str, room_id: &str, user_id: &str, at: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let inserted = tx.execute(
                "INSERT INTO read_receipts (message_id, user_id, read_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(message_id, user_id) DO NOTHING",
                params![message_id, user_id, at],
            )?;
            if inserted == 0 {
                return Ok(false);
            }

            decrement_unread_in(&tx, room_id, user_id)?;
            tx.commit()?;
            Ok(true)
        })
    }

    /// Receipt every unread message from others in the room and zero the
    /// reader's counter. Returns the ids that were newly receipted, oldest first.
    pub fn mark_room_read(&self, room_id: &str, user_id: &str, at: &str) -> Result<Vec<String>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let unread: Vec<String> = {
                let mut stmt = tx.prepare(
                    "SELECT m.id FROM messages m
                     WHERE m.room_id = ?1 AND m.sender_id != ?2
                       AND NOT EXISTS (
                           SELECT 1 FROM read_receipts rr WHERE rr.message_id = m.id AND rr.user_id = ?2
                       )
                     ORDER BY m.created_at, m.rowid",
                )?;
                let ids = stmt
                    .query_map([room_id, user_id], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                ids
            };

            let mut newly_read = Vec::with_capacity(unread.len());
            for message_id in unread {
                // A concurrent single-message receipt is not an error
                let inserted = tx.execute(
                    "INSERT INTO read_receipts (message_id, user_id, read_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(message_id, user_id) DO NOTHING",
                    params![message_id, user_id, at],
                )?;
                if inserted == 1 {
                    newly_read.push(message_id);
                }
            }

            tx.execute(
                "UPDATE room_members SET unread_count = 0 WHERE room_id = ?1 AND user_id = ?2",
                [room_id, user_id],
            )?;

            tx.commit()?;
            Ok(newly_read)
        })
    }

    pub fn receipts_for_messages(&self, message_ids: &[String]) -> Result<Vec<ReceiptRow>> {
        self.with_conn(|conn| {
            query_by_ids(
                conn,
                "SELECT message_id, user_id, read_at FROM read_receipts
                 WHERE message_id IN ({ids}) ORDER BY read_at",
                message_ids,
                receipt_from_row,
            )
        })
    }

    // -- Delivery acks --

    /// Returns true if this ack is new.
    pub fn insert_delivery(&self, message_id: &str, user_id: &str, at: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO message_deliveries (message_id, user_id, delivered_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(message_id, user_id) DO NOTHING",
                params![message_id, user_id, at],
            )?;
            Ok(inserted == 1)
        })
    }

    pub fn deliveries_for_messages(&self, message_ids: &[String]) -> Result<Vec<DeliveryRow>> {
        self.with_conn(|conn| {
            query_by_ids(
                conn,
                "SELECT message_id, user_id, delivered_at FROM message_deliveries WHERE message_id IN ({ids})",
                message_ids,
                |row| {
                    Ok(DeliveryRow {
                        message_id: row.get(0)?,
                        user_id: row.get(1)?,
                        delivered_at: row.get(2)?,
                    })
                },
            )
        })
    }
}

fn receipt_from_row(row: &Row<'_>) -> rusqlite::Result<ReceiptRow> {
    Ok(ReceiptRow {
        message_id: row.get(0)?,
        user_id: row.get(1)?,
        read_at: row.get(2)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::now_timestamp;
    use crate::queries::fixtures::{db_with_users, new_id};

    #[test]
    fn mark_read_is_idempotent() {
        let (db, ids) = db_with_users(&["alice", "bob"]);
        let (room, _) = db.find_or_create_direct_room(&new_id(), &ids[0], &ids[1]).unwrap();
        let msg = new_id();
        let at = now_timestamp();
        db.insert_message(&msg, &room.id, &ids[0], "hi", &at).unwrap();
        db.increment_unread_for_others(&room.id, &ids[0]).unwrap();

        assert!(db.mark_read(&msg, &room.id, &ids[1], &at).unwrap());
        assert!(!db.mark_read(&msg, &room.id, &ids[1], &at).unwrap());
        assert_eq!(db.receipts_for_messages(&[msg]).unwrap().len(), 1);
        assert_eq!(db.get_membership(&room.id, &ids[1]).unwrap().unwrap().unread_count, 0);
    }

    #[test]
    fn mark_room_read_skips_already_read_and_own_messages() {
        let (db, ids) = db_with_users(&["alice", "bob"]);
        let (room, _) = db.find_or_create_direct_room(&new_id(), &ids[0], &ids[1]).unwrap();
        let at = now_timestamp();
        let from_alice: Vec<String> = (0..3).map(|_| new_id()).collect();
        for id in &from_alice {
            db.insert_message(id, &room.id, &ids[0], "x", &at).unwrap();
            db.increment_unread_for_others(&room.id, &ids[0]).unwrap();
        }
        db.insert_message(&new_id(), &room.id, &ids[1], "mine", &at).unwrap();
        db.mark_read(&from_alice[0], &room.id, &ids[1], &at).unwrap();

        let newly = db.mark_room_read(&room.id, &ids[1], &at).unwrap();
        assert_eq!(newly, from_alice[1..].to_vec());
        assert_eq!(db.count_unread(&room.id, &ids[1]).unwrap(), 0);
        assert_eq!(db.get_membership(&room.id, &ids[1]).unwrap().unwrap().unread_count, 0);
    }

    #[test]
    fn delivery_ack_recorded_once() {
        let (db, ids) = db_with_users(&["alice", "bob"]);
        let (room, _) = db.find_or_create_direct_room(&new_id(), &ids[0], &ids[1]).unwrap();
        let msg = new_id();
        let at = now_timestamp();
        db.insert_message(&msg, &room.id, &ids[0], "hi", &at).unwrap();

        assert!(db.insert_delivery(&msg, &ids[1], &at).unwrap());
        assert!(!db.insert_delivery(&msg, &ids[1], &at).unwrap());
        assert_eq!(db.deliveries_for_messages(&[msg]).unwrap().len(), 1);
    }
}
