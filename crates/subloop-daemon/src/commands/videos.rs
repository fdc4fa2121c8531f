//! Video catalog command handlers.

use std::sync::Arc;

use serde_json::{json, Value};
use subloop_campaign::catalog;
use subloop_campaign::youtube::{
    extract_video_id, parse_iso8601_duration, thumbnail_url, watch_url,
};

use super::{optional_str, optional_u32, required_str, to_json, Result};
use crate::DaemonState;

const DEFAULT_LIST_LIMIT: u32 = 20;
const DEFAULT_POPULAR_LIMIT: u32 = 10;

pub async fn list_videos(state: &Arc<DaemonState>, params: &Value) -> Result {
    let limit = optional_u32(params, "limit")?.unwrap_or(DEFAULT_LIST_LIMIT);
    let offset = optional_u32(params, "offset")?.unwrap_or(0);
    let db = state.db.lock().await;
    to_json(&catalog::list_videos(&db, limit, offset)?)
}

pub async fn search_videos(state: &Arc<DaemonState>, params: &Value) -> Result {
    let query = optional_str(params, "query")?.unwrap_or_default();
    let limit = optional_u32(params, "limit")?.unwrap_or(DEFAULT_LIST_LIMIT);
    let db = state.db.lock().await;
    to_json(&catalog::search_videos(&db, query, limit)?)
}

pub async fn get_video(state: &Arc<DaemonState>, params: &Value) -> Result {
    let video_id = required_str(params, "video_id")?;
    let db = state.db.lock().await;
    to_json(&catalog::get_video(&db, video_id)?)
}

pub async fn get_popular_videos(state: &Arc<DaemonState>, params: &Value) -> Result {
    let limit = optional_u32(params, "limit")?.unwrap_or(DEFAULT_POPULAR_LIMIT);
    let db = state.db.lock().await;
    to_json(&catalog::popular_videos(&db, limit)?)
}

/// Resolve a pasted URL without touching the catalog.
pub fn parse_video_url(params: &Value) -> Result {
    let url = required_str(params, "url")?;
    let duration_secs = optional_str(params, "duration")?.map(parse_iso8601_duration);
    Ok(match extract_video_id(url) {
        Some(video_id) => json!({
            "valid": true,
            "watch_url": watch_url(&video_id),
            "thumbnail_url": thumbnail_url(&video_id),
            "duration_secs": duration_secs,
            "video_id": video_id,
        }),
        None => json!({ "valid": false, "video_id": null }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::state;
    use subloop_campaign::catalog::VideoInput;

    #[test]
    fn test_parse_video_url() {
        let parsed = parse_video_url(&json!({
            "url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42",
            "duration": "PT1M5S",
        }))
        .expect("parse");
        assert_eq!(parsed["valid"], true);
        assert_eq!(parsed["video_id"], "dQw4w9WgXcQ");
        assert_eq!(parsed["duration_secs"], 65);

        let parsed = parse_video_url(&json!({"url": "https://example.com/x"})).expect("parse");
        assert_eq!(parsed["valid"], false);

        assert!(parse_video_url(&json!({})).is_err());
    }

    #[tokio::test]
    async fn test_catalog_queries() {
        let state = state();
        let id = {
            let db = state.db.lock().await;
            catalog::register_video(
                &db,
                &VideoInput {
                    url: "https://youtu.be/dQw4w9WgXcQ".into(),
                    title: Some("Lofi beats".into()),
                    ..Default::default()
                },
                10,
            )
            .expect("register")
            .id
        };

        let video = get_video(&state, &json!({"video_id": id})).await.expect("get");
        assert_eq!(video["title"], "Lofi beats");

        let found = search_videos(&state, &json!({"query": "lofi"})).await.expect("search");
        assert_eq!(found.as_array().expect("array").len(), 1);

        let listed = list_videos(&state, &json!({})).await.expect("list");
        assert_eq!(listed.as_array().expect("array").len(), 1);

        let err = get_video(&state, &json!({"video_id": "missing"}))
            .await
            .expect_err("missing");
        assert_eq!(err.code, -32004);
    }
}
