use anyhow::Result;
use rusqlite::params;

use super::query_by_ids;
use crate::Database;
use crate::models::MediaRow;

impl Database {
    pub fn insert_media(&self, media: &MediaRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO media (id, message_id, uploader_id, media_type, url, file_name, file_size, mime_type, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    media.id,
                    media.message_id,
                    media.uploader_id,
                    media.media_type,
                    media.url,
                    media.file_name,
                    media.file_size,
                    media.mime_type,
                    media.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn media_for_messages(&self, message_ids: &[String]) -> Result<Vec<MediaRow>> {
        self.with_conn(|conn| {
            query_by_ids(
                conn,
                "SELECT id, message_id, uploader_id, media_type, url, file_name, file_size, mime_type, created_at
                 FROM media WHERE message_id IN ({ids}) ORDER BY created_at, rowid",
                message_ids,
                |row| {
                    Ok(MediaRow {
                        id: row.get(0)?,
                        message_id: row.get(1)?,
                        uploader_id: row.get(2)?,
                        media_type: row.get(3)?,
                        url: row.get(4)?,
                        file_name: row.get(5)?,
                        file_size: row.get(6)?,
                        mime_type: row.get(7)?,
                        created_at: row.get(8)?,
                    })
                },
            )
        })
    }
}
