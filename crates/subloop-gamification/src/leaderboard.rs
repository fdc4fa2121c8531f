//! Ranking by level and XP.

use rusqlite::Connection;
use serde::Serialize;
use subloop_db::queries::profiles;

use crate::Result;

pub const MAX_LEADERBOARD_LIMIT: u32 = 100;

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    /// 1-based position.
    pub rank: u32,
    pub user_id: String,
    pub username: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub level: u32,
    pub xp: u64,
    pub streak_count: u32,
}

/// Top users by level, then XP, then account age.
pub fn leaderboard(conn: &Connection, limit: u32) -> Result<Vec<LeaderboardEntry>> {
    let rows = profiles::leaderboard(conn, limit.clamp(1, MAX_LEADERBOARD_LIMIT))?;
    Ok(rows
        .into_iter()
        .zip(1u32..)
        .map(|(p, rank)| LeaderboardEntry {
            rank,
            user_id: p.id,
            username: p.username,
            full_name: p.full_name,
            avatar_url: p.avatar_url,
            level: p.level,
            xp: p.xp,
            streak_count: p.streak_count,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranks() {
        let conn = subloop_db::open_memory().expect("open");
        for (i, (id, xp, level)) in [("a", 50u64, 1u32), ("b", 300, 3), ("c", 120, 2)]
            .into_iter()
            .enumerate()
        {
            profiles::insert(&conn, id, id, None, i as u64).expect("profile");
            profiles::set_progress(&conn, id, xp, level, 0).expect("progress");
        }
        let board = leaderboard(&conn, 10).expect("board");
        let ranked: Vec<_> = board.iter().map(|e| (e.rank, e.user_id.as_str())).collect();
        assert_eq!(ranked, vec![(1, "b"), (2, "c"), (3, "a")]);

        assert_eq!(leaderboard(&conn, 1).expect("top").len(), 1);
        assert_eq!(leaderboard(&conn, 0).expect("clamped").len(), 1);
    }
}
