//! XP table and level progression.

use rusqlite::Connection;
use serde::Serialize;
use subloop_db::queries::profiles;
use subloop_types::TaskType;

use crate::Result;

/// Total XP required to reach level `i + 1`.
pub const LEVEL_THRESHOLDS: [u64; 15] = [
    0, 100, 250, 500, 1_000, 2_000, 3_500, 5_500, 8_000, 12_000, 17_000, 23_000, 30_000, 40_000,
    50_000,
];

/// Highest reachable level.
pub const MAX_LEVEL: u32 = LEVEL_THRESHOLDS.len() as u32;

/// XP granted for completing a task of a type.
pub fn xp_for(task_type: TaskType) -> u64 {
    match task_type {
        TaskType::Watch => 10,
        TaskType::Like => 20,
        TaskType::Subscribe => 50,
    }
}

/// Level for a total XP amount.
pub fn level_for_xp(xp: u64) -> u32 {
    LEVEL_THRESHOLDS
        .iter()
        .rposition(|&threshold| xp >= threshold)
        .map(|i| i as u32 + 1)
        .unwrap_or(1)
}

/// XP needed to reach the level after `level`. At the cap this is the
/// final threshold.
pub fn next_level_xp(level: u32) -> u64 {
    LEVEL_THRESHOLDS
        .get(level as usize)
        .copied()
        .unwrap_or(LEVEL_THRESHOLDS[LEVEL_THRESHOLDS.len() - 1])
}

/// XP at which `level` starts.
pub fn level_start_xp(level: u32) -> u64 {
    let idx = (level.max(1) as usize - 1).min(LEVEL_THRESHOLDS.len() - 1);
    LEVEL_THRESHOLDS[idx]
}

/// Outcome of [`award_xp`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct XpAward {
    pub xp_awarded: u64,
    pub new_xp: u64,
    pub previous_level: u32,
    pub new_level: u32,
    pub leveled_up: bool,
    pub next_level_xp: u64,
}

/// Grant the XP for one completed task and recompute the level.
pub fn award_xp(
    conn: &Connection,
    user_id: &str,
    task_type: TaskType,
    now: u64,
) -> Result<XpAward> {
    let profile = profiles::get(conn, user_id)?;
    let xp_awarded = xp_for(task_type);
    let new_xp = profile.xp.saturating_add(xp_awarded);
    // Levels never go down, even if the table changes.
    let new_level = level_for_xp(new_xp).max(profile.level);

    profiles::set_progress(conn, user_id, new_xp, new_level, now)?;

    let leveled_up = new_level > profile.level;
    if leveled_up {
        tracing::info!(user_id, level = new_level, "level up");
    }

    Ok(XpAward {
        xp_awarded,
        new_xp,
        previous_level: profile.level,
        new_level,
        leveled_up,
        next_level_xp: next_level_xp(new_level),
    })
}

/// A user's position on the level curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub level: u32,
    pub xp: u64,
    pub streak_count: u32,
    pub current_level_xp: u64,
    pub next_level_xp: u64,
    /// XP earned since the start of the current level.
    pub progress_xp: u64,
    /// XP between the current and next level.
    pub needed_xp: u64,
    /// Progress through the current level, capped at 100.
    pub percentage: f64,
    pub max_level: bool,
}

/// Level progress for a user.
pub fn progress(conn: &Connection, user_id: &str) -> Result<Progress> {
    let profile = profiles::get(conn, user_id)?;
    let current_level_xp = level_start_xp(profile.level);
    let next = next_level_xp(profile.level);
    let max_level = profile.level >= MAX_LEVEL;

    let progress_xp = profile.xp.saturating_sub(current_level_xp);
    let needed_xp = next.saturating_sub(current_level_xp);
    let percentage = if max_level || needed_xp == 0 {
        100.0
    } else {
        (progress_xp as f64 / needed_xp as f64 * 100.0).min(100.0)
    };

    Ok(Progress {
        level: profile.level,
        xp: profile.xp,
        streak_count: profile.streak_count,
        current_level_xp,
        next_level_xp: next,
        progress_xp,
        needed_xp,
        percentage,
        max_level,
    })
}
