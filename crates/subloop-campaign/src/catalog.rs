//! Video catalog.
//!
//! The daemon never calls the YouTube Data API; clients send whatever
//! metadata they resolved along with the URL and the catalog keeps the
//! latest non-empty value of each field.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use subloop_db::queries::videos::{self, NewVideo, VideoRow};
use subloop_db::DbError;

use crate::youtube::{extract_video_id, parse_iso8601_duration, thumbnail_url};
use crate::{CampaignError, Result};

/// Maximum page size for catalog listings.
pub const MAX_LIST_LIMIT: u32 = 100;

/// Video metadata as supplied by a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoInput {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub channel_name: Option<String>,
    pub channel_id: Option<String>,
    pub thumbnail_url: Option<String>,
    /// ISO 8601 duration such as `PT4M13S`.
    pub duration: Option<String>,
}

/// A catalog entry with the number of tasks pointing at it.
#[derive(Debug, Clone, Serialize)]
pub struct PopularVideo {
    #[serde(flatten)]
    pub video: VideoRow,
    pub task_count: u64,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Add a video to the catalog or refresh its metadata.
pub fn register_video(conn: &Connection, input: &VideoInput, now: u64) -> Result<VideoRow> {
    let youtube_id =
        extract_video_id(&input.url).ok_or_else(|| CampaignError::InvalidUrl(input.url.clone()))?;

    let existing = match videos::get_by_youtube_id(conn, &youtube_id) {
        Ok(row) => Some(row),
        Err(DbError::NotFound(_)) => None,
        Err(e) => return Err(e.into()),
    };

    let title = non_empty(&input.title)
        .or_else(|| existing.as_ref().map(|v| v.title.clone()))
        .unwrap_or_else(|| format!("YouTube video {youtube_id}"));

    let new = NewVideo {
        thumbnail_url: non_empty(&input.thumbnail_url).or_else(|| {
            existing
                .as_ref()
                .and_then(|v| v.thumbnail_url.clone())
                .or_else(|| Some(thumbnail_url(&youtube_id)))
        }),
        youtube_id,
        title,
        description: non_empty(&input.description),
        channel_name: non_empty(&input.channel_name),
        channel_id: non_empty(&input.channel_id),
        duration_secs: input
            .duration
            .as_deref()
            .map(parse_iso8601_duration)
            .unwrap_or(0),
    };

    let id = uuid::Uuid::new_v4().to_string();
    let video = videos::upsert(conn, &id, &new, now)?;
    tracing::debug!(video_id = %video.id, youtube_id = %video.youtube_id, "video registered");
    Ok(video)
}

pub fn get_video(conn: &Connection, id: &str) -> Result<VideoRow> {
    Ok(videos::get(conn, id)?)
}

pub fn list_videos(conn: &Connection, limit: u32, offset: u32) -> Result<Vec<VideoRow>> {
    Ok(videos::list(conn, limit.clamp(1, MAX_LIST_LIMIT), offset)?)
}

/// Search titles and channel names. A blank query returns nothing.
pub fn search_videos(conn: &Connection, query: &str, limit: u32) -> Result<Vec<VideoRow>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }
    Ok(videos::search(conn, query, limit.clamp(1, MAX_LIST_LIMIT))?)
}

/// Videos with the most tasks.
pub fn popular_videos(conn: &Connection, limit: u32) -> Result<Vec<PopularVideo>> {
    let rows = videos::popular(conn, limit.clamp(1, MAX_LIST_LIMIT))?;
    Ok(rows
        .into_iter()
        .map(|(video, task_count)| PopularVideo { video, task_count })
        .collect())
}
