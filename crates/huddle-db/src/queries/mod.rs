mod media;
mod messages;
mod notifications;
mod reactions;
mod receipts;
mod rooms;
mod users;

pub use rooms::direct_key;

use anyhow::Result;
use rusqlite::{Connection, Row};

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// `?1, ?2, ..., ?n`
fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
}

/// Batch-fetch rows keyed by a list of ids. `sql` must contain `{ids}` where
/// the `IN (...)` list goes. Avoids one query per message (N+1).
fn query_by_ids<T, F>(conn: &Connection, sql: &str, ids: &[String], map: F) -> Result<Vec<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    if ids.is_empty() {
        return Ok(vec![]);
    }

    let sql = sql.replace("{ids}", &placeholders(ids.len()));
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(ids.iter()), map)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::Database;

    pub fn db_with_users(names: &[&str]) -> (Database, Vec<String>) {
        let db = Database::open_in_memory().unwrap();
        let ids: Vec<String> = names
            .iter()
            .map(|name| {
                let id = uuid::Uuid::new_v4().to_string();
                db.upsert_user(&id, name, None).unwrap();
                id
            })
            .collect();
        (db, ids)
    }

    pub fn new_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}
