//! Video catalog query functions.

use rusqlite::Connection;
use serde::Serialize;

use super::ts;
use crate::{DbError, Result};

const VIDEO_COLUMNS: &str = "v.id, v.youtube_id, v.title, v.description, v.channel_name,
     v.channel_id, v.thumbnail_url, v.duration_secs, v.created_at, v.updated_at";

/// A catalog entry.
#[derive(Debug, Clone, Serialize)]
pub struct VideoRow {
    pub id: String,
    pub youtube_id: String,
    pub title: String,
    pub description: Option<String>,
    pub channel_name: Option<String>,
    pub channel_id: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration_secs: u32,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Metadata supplied when registering a video.
#[derive(Debug, Clone, Default)]
pub struct NewVideo {
    pub youtube_id: String,
    pub title: String,
    pub description: Option<String>,
    pub channel_name: Option<String>,
    pub channel_id: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration_secs: u32,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VideoRow> {
    Ok(VideoRow {
        id: row.get(0)?,
        youtube_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        channel_name: row.get(4)?,
        channel_id: row.get(5)?,
        thumbnail_url: row.get(6)?,
        duration_secs: row.get(7)?,
        created_at: ts(row, 8)?,
        updated_at: ts(row, 9)?,
    })
}

/// Insert or refresh a video keyed by its YouTube id.
///
/// `id` is used only when the video is new; an existing row keeps its id.
pub fn upsert(conn: &Connection, id: &str, video: &NewVideo, now: u64) -> Result<VideoRow> {
    conn.execute(
        "INSERT INTO videos (id, youtube_id, title, description, channel_name, channel_id,
                             thumbnail_url, duration_secs, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
         ON CONFLICT(youtube_id) DO UPDATE SET
            title = excluded.title,
            description = COALESCE(excluded.description, description),
            channel_name = COALESCE(excluded.channel_name, channel_name),
            channel_id = COALESCE(excluded.channel_id, channel_id),
            thumbnail_url = COALESCE(excluded.thumbnail_url, thumbnail_url),
            duration_secs = CASE WHEN excluded.duration_secs > 0
                                 THEN excluded.duration_secs ELSE duration_secs END,
            updated_at = excluded.updated_at",
        rusqlite::params![
            id,
            video.youtube_id,
            video.title,
            video.description,
            video.channel_name,
            video.channel_id,
            video.thumbnail_url,
            video.duration_secs,
            now as i64,
        ],
    )?;
    get_by_youtube_id(conn, &video.youtube_id)
}

/// Get a video by catalog id.
pub fn get(conn: &Connection, id: &str) -> Result<VideoRow> {
    conn.query_row(
        &format!("SELECT {VIDEO_COLUMNS} FROM videos v WHERE v.id = ?1"),
        [id],
        map_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("video {id}")),
        other => DbError::Sqlite(other),
    })
}

/// Get a video by its 11-character YouTube id.
pub fn get_by_youtube_id(conn: &Connection, youtube_id: &str) -> Result<VideoRow> {
    conn.query_row(
        &format!("SELECT {VIDEO_COLUMNS} FROM videos v WHERE v.youtube_id = ?1"),
        [youtube_id],
        map_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            DbError::NotFound(format!("youtube video {youtube_id}"))
        }
        other => DbError::Sqlite(other),
    })
}

/// List videos, newest first.
pub fn list(conn: &Connection, limit: u32, offset: u32) -> Result<Vec<VideoRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {VIDEO_COLUMNS} FROM videos v ORDER BY v.created_at DESC, v.id LIMIT ?1 OFFSET ?2"
    ))?;
    let rows = stmt
        .query_map([limit, offset], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Case-insensitive substring search over title and channel name.
pub fn search(conn: &Connection, query: &str, limit: u32) -> Result<Vec<VideoRow>> {
    let escaped = query
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    let pattern = format!("%{escaped}%");
    let mut stmt = conn.prepare(&format!(
        "SELECT {VIDEO_COLUMNS} FROM videos v
         WHERE lower(v.title) LIKE ?1 ESCAPE '\\'
            OR lower(COALESCE(v.channel_name, '')) LIKE ?1 ESCAPE '\\'
         ORDER BY v.created_at DESC, v.id
         LIMIT ?2"
    ))?;
    let rows = stmt
        .query_map(rusqlite::params![pattern, limit], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Videos ranked by how many tasks reference them.
pub fn popular(conn: &Connection, limit: u32) -> Result<Vec<(VideoRow, u64)>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {VIDEO_COLUMNS}, COUNT(t.id) AS task_count
         FROM videos v LEFT JOIN tasks t ON t.video_id = v.id
         GROUP BY v.id
         ORDER BY task_count DESC, v.created_at DESC
         LIMIT ?1"
    ))?;
    let rows = stmt
        .query_map([limit], |row| {
            Ok((map_row(row)?, row.get::<_, i64>(10)? as u64))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
