use anyhow::Result;
use rusqlite::{Connection, Row};

use super::{OptionalExt, query_by_ids};
use crate::models::UserRow;
use crate::{Database, now_timestamp};

impl Database {
    /// Mirror an externally authenticated identity into the local directory.
    pub fn upsert_user(&self, id: &str, username: &str, display_name: Option<&str>) -> Result<()> {
        let now = now_timestamp();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, display_name, created_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                     username = excluded.username,
                     display_name = COALESCE(excluded.display_name, users.display_name)",
                rusqlite::params![id, username, display_name, now],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    /// Returns the ids from `ids` that have no user record.
    pub fn missing_user_ids(&self, ids: &[String]) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let found: Vec<String> =
                query_by_ids(conn, "SELECT id FROM users WHERE id IN ({ids})", ids, |row| row.get(0))?;
            Ok(ids.iter().filter(|id| !found.contains(id)).cloned().collect())
        })
    }
}

fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT id, username, display_name, created_at FROM users WHERE id = ?1")?;
    stmt.query_row([id], user_from_row).optional()
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        display_name: row.get(2)?,
        created_at: row.get(3)?,
    })
}
