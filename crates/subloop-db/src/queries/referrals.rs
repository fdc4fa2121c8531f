//! Referral event query functions.

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use super::ts;
use crate::Result;

/// A processed referral.
#[derive(Debug, Clone, Serialize)]
pub struct ReferralEventRow {
    pub id: String,
    pub referrer_id: String,
    pub referee_id: String,
    pub referral_code: String,
    pub bonus_awarded: i64,
    pub created_at: u64,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReferralEventRow> {
    Ok(ReferralEventRow {
        id: row.get(0)?,
        referrer_id: row.get(1)?,
        referee_id: row.get(2)?,
        referral_code: row.get(3)?,
        bonus_awarded: row.get(4)?,
        created_at: ts(row, 5)?,
    })
}

/// Insert a referral event. A referee can appear only once.
pub fn insert(conn: &Connection, event: &ReferralEventRow) -> Result<()> {
    conn.execute(
        "INSERT INTO referral_events
            (id, referrer_id, referee_id, referral_code, bonus_awarded, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            event.id,
            event.referrer_id,
            event.referee_id,
            event.referral_code,
            event.bonus_awarded,
            event.created_at as i64,
        ],
    )?;
    Ok(())
}

/// The event recording who referred `referee_id`, if any.
pub fn for_referee(conn: &Connection, referee_id: &str) -> Result<Option<ReferralEventRow>> {
    let row = conn
        .query_row(
            "SELECT id, referrer_id, referee_id, referral_code, bonus_awarded, created_at
             FROM referral_events WHERE referee_id = ?1",
            [referee_id],
            map_row,
        )
        .optional()?;
    Ok(row)
}

/// Events where the user is referrer or referee, newest first.
pub fn for_user(conn: &Connection, user_id: &str) -> Result<Vec<ReferralEventRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, referrer_id, referee_id, referral_code, bonus_awarded, created_at
         FROM referral_events WHERE referrer_id = ?1 OR referee_id = ?1
         ORDER BY created_at DESC, rowid DESC",
    )?;
    let rows = stmt
        .query_map([user_id], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Number of users referred by `referrer_id` since `since`.
pub fn count_for_referrer(conn: &Connection, referrer_id: &str, since: u64) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM referral_events WHERE referrer_id = ?1 AND created_at >= ?2",
        rusqlite::params![referrer_id, since as i64],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}
