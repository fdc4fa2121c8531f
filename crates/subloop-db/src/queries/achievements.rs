//! Achievement query functions.

use rusqlite::Connection;
use serde::Serialize;

use crate::Result;

/// An unlocked achievement.
#[derive(Debug, Clone, Serialize)]
pub struct AchievementRow {
    pub achievement_id: String,
    pub unlocked_at: u64,
}

/// Record an unlock. Returns `false` if the user already had it.
pub fn unlock(conn: &Connection, user_id: &str, achievement_id: &str, now: u64) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO user_achievements (user_id, achievement_id, unlocked_at)
         VALUES (?1, ?2, ?3)",
        rusqlite::params![user_id, achievement_id, now as i64],
    )?;
    Ok(inserted == 1)
}

/// Achievements unlocked by a user, oldest first.
pub fn list(conn: &Connection, user_id: &str) -> Result<Vec<AchievementRow>> {
    let mut stmt = conn.prepare(
        "SELECT achievement_id, unlocked_at FROM user_achievements
         WHERE user_id = ?1 ORDER BY unlocked_at, achievement_id",
    )?;
    let rows = stmt
        .query_map([user_id], |row| {
            Ok(AchievementRow {
                achievement_id: row.get(0)?,
                unlocked_at: super::ts(row, 1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::profiles;

    #[test]
    fn test_unlock_once() {
        let conn = crate::open_memory().expect("open");
        profiles::insert(&conn, "u1", "alice", None, 0).expect("profile");
        assert!(unlock(&conn, "u1", "first_task", 10).expect("unlock"));
        assert!(!unlock(&conn, "u1", "first_task", 20).expect("again"));
        let rows = list(&conn, "u1").expect("list");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].unlocked_at, 10);
    }
}
