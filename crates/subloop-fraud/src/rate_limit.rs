//! Sliding-window rate limits over the fraud log.

use rusqlite::Connection;
use serde::Serialize;
use subloop_db::queries::fraud;

use crate::Result;

pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;
pub const DEFAULT_WINDOW_MINUTES: u32 = 60;
pub const MAX_WINDOW_MINUTES: u32 = 1_440;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimit {
    pub is_allowed: bool,
    pub count: u64,
    pub limit: u32,
    pub remaining: u64,
    pub window_minutes: u32,
}

/// Count `action` events by `user_id` inside the window.
///
/// Zero or missing `limit`/`window_minutes` fall back to the defaults; both
/// are capped.
pub fn rate_limit_check(
    conn: &Connection,
    user_id: &str,
    action: &str,
    limit: Option<u32>,
    window_minutes: Option<u32>,
    now: u64,
) -> Result<RateLimit> {
    let limit = limit.filter(|&l| l > 0).unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let window_minutes = window_minutes
        .filter(|&w| w > 0)
        .unwrap_or(DEFAULT_WINDOW_MINUTES)
        .min(MAX_WINDOW_MINUTES);

    let since = now.saturating_sub(u64::from(window_minutes) * 60);
    let count = fraud::count_since(conn, user_id, Some(action), since)?;
    let is_allowed = count < u64::from(limit);
    if !is_allowed {
        tracing::debug!(user_id, action, count, limit, "rate limit reached");
    }

    Ok(RateLimit {
        is_allowed,
        count,
        limit,
        remaining: u64::from(limit).saturating_sub(count),
        window_minutes,
    })
}
