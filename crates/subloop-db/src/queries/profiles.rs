//! Profile query functions.

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use super::{opt_ts, ts};
use crate::{DbError, Result};

const PROFILE_COLUMNS: &str = "id, username, full_name, avatar_url, bio, youtube_channel,
     credits, level, xp, streak_count, last_login_day, last_reward_day,
     referral_code, referred_by, created_at, updated_at";

/// A profile row.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileRow {
    pub id: String,
    pub username: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub youtube_channel: Option<String>,
    pub credits: i64,
    pub level: u32,
    pub xp: u64,
    pub streak_count: u32,
    pub last_login_day: Option<u64>,
    pub last_reward_day: Option<u64>,
    pub referral_code: Option<String>,
    pub referred_by: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProfileRow> {
    Ok(ProfileRow {
        id: row.get(0)?,
        username: row.get(1)?,
        full_name: row.get(2)?,
        avatar_url: row.get(3)?,
        bio: row.get(4)?,
        youtube_channel: row.get(5)?,
        credits: row.get(6)?,
        level: row.get(7)?,
        xp: row.get::<_, i64>(8)? as u64,
        streak_count: row.get(9)?,
        last_login_day: opt_ts(row, 10)?,
        last_reward_day: opt_ts(row, 11)?,
        referral_code: row.get(12)?,
        referred_by: row.get(13)?,
        created_at: ts(row, 14)?,
        updated_at: ts(row, 15)?,
    })
}

/// Insert a new profile with zero credits at level 1.
pub fn insert(
    conn: &Connection,
    id: &str,
    username: &str,
    full_name: Option<&str>,
    now: u64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO profiles (id, username, full_name, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        rusqlite::params![id, username, full_name, now as i64],
    )?;
    Ok(())
}

/// Get a profile by id.
pub fn get(conn: &Connection, id: &str) -> Result<ProfileRow> {
    conn.query_row(
        &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1"),
        [id],
        map_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("profile {id}")),
        other => DbError::Sqlite(other),
    })
}

/// Whether a profile exists.
pub fn exists(conn: &Connection, id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM profiles WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

/// Whether a username is taken.
pub fn username_taken(conn: &Connection, username: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM profiles WHERE username = ?1",
            [username],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Find the profile owning a referral code.
pub fn get_by_referral_code(conn: &Connection, code: &str) -> Result<ProfileRow> {
    conn.query_row(
        &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE referral_code = ?1"),
        [code],
        map_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("referral code {code}")),
        other => DbError::Sqlite(other),
    })
}

/// Whether a referral code is already assigned.
pub fn referral_code_taken(conn: &Connection, code: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM profiles WHERE referral_code = ?1",
            [code],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Editable profile fields. `None` leaves a field unchanged.
#[derive(Debug, Default, Clone)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub youtube_channel: Option<String>,
}

/// Apply a profile update.
pub fn update_details(conn: &Connection, id: &str, update: &ProfileUpdate, now: u64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE profiles SET
            username = COALESCE(?2, username),
            full_name = COALESCE(?3, full_name),
            avatar_url = COALESCE(?4, avatar_url),
            bio = COALESCE(?5, bio),
            youtube_channel = COALESCE(?6, youtube_channel),
            updated_at = ?7
         WHERE id = ?1",
        rusqlite::params![
            id,
            update.username,
            update.full_name,
            update.avatar_url,
            update.bio,
            update.youtube_channel,
            now as i64,
        ],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("profile {id}")));
    }
    Ok(())
}

/// Current credit balance.
pub fn credits(conn: &Connection, id: &str) -> Result<i64> {
    conn.query_row("SELECT credits FROM profiles WHERE id = ?1", [id], |row| {
        row.get(0)
    })
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("profile {id}")),
        other => DbError::Sqlite(other),
    })
}

/// Overwrite the credit balance. Only the ledger crate calls this.
pub fn set_credits(conn: &Connection, id: &str, credits: i64, now: u64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE profiles SET credits = ?2, updated_at = ?3 WHERE id = ?1",
        rusqlite::params![id, credits, now as i64],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("profile {id}")));
    }
    Ok(())
}

/// Store XP and level.
pub fn set_progress(conn: &Connection, id: &str, xp: u64, level: u32, now: u64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE profiles SET xp = ?2, level = ?3, updated_at = ?4 WHERE id = ?1",
        rusqlite::params![id, xp as i64, level, now as i64],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("profile {id}")));
    }
    Ok(())
}

/// Store the streak counter and the day it was last advanced.
pub fn set_streak(
    conn: &Connection,
    id: &str,
    streak_count: u32,
    last_login_day: u64,
    now: u64,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE profiles SET streak_count = ?2, last_login_day = ?3, updated_at = ?4
         WHERE id = ?1",
        rusqlite::params![id, streak_count, last_login_day as i64, now as i64],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("profile {id}")));
    }
    Ok(())
}

/// Record the day a daily reward was claimed.
pub fn set_last_reward_day(conn: &Connection, id: &str, day: u64, now: u64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE profiles SET last_reward_day = ?2, updated_at = ?3 WHERE id = ?1",
        rusqlite::params![id, day as i64, now as i64],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("profile {id}")));
    }
    Ok(())
}

/// Assign a referral code.
pub fn set_referral_code(conn: &Connection, id: &str, code: &str, now: u64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE profiles SET referral_code = ?2, updated_at = ?3 WHERE id = ?1",
        rusqlite::params![id, code, now as i64],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("profile {id}")));
    }
    Ok(())
}

/// Record who referred this profile. Fails if already set.
pub fn set_referred_by(conn: &Connection, id: &str, referrer: &str, now: u64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE profiles SET referred_by = ?2, updated_at = ?3
         WHERE id = ?1 AND referred_by IS NULL",
        rusqlite::params![id, referrer, now as i64],
    )?;
    if updated == 0 {
        return Err(DbError::Constraint(format!(
            "profile {id} missing or already referred"
        )));
    }
    Ok(())
}

/// Profiles ordered for the leaderboard: level, then XP, then seniority.
pub fn leaderboard(conn: &Connection, limit: u32) -> Result<Vec<ProfileRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles
         ORDER BY level DESC, xp DESC, created_at ASC
         LIMIT ?1"
    ))?;
    let rows = stmt
        .query_map([limit], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Profiles referred by `referrer`, newest first.
pub fn referred_by(conn: &Connection, referrer: &str) -> Result<Vec<ProfileRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles WHERE referred_by = ?1
         ORDER BY created_at DESC"
    ))?;
    let rows = stmt
        .query_map([referrer], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// All profile ids with their stored balance.
pub fn all_balances(conn: &Connection) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare("SELECT id, credits FROM profiles ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
