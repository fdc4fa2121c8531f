//! Campaign query functions.

use rusqlite::Connection;
use serde::Serialize;
use subloop_types::CampaignStatus;

use super::{text_enum, ts};
use crate::{DbError, Result};

const CAMPAIGN_COLUMNS: &str = "id, user_id, video_id, title, description, target_actions,
     completed_actions, credits_allocated, credits_spent, status, created_at, updated_at";

/// A campaign row.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignRow {
    pub id: String,
    pub user_id: String,
    pub video_id: String,
    pub title: String,
    pub description: Option<String>,
    pub target_actions: u32,
    pub completed_actions: u32,
    pub credits_allocated: i64,
    pub credits_spent: i64,
    pub status: CampaignStatus,
    pub created_at: u64,
    pub updated_at: u64,
}

impl CampaignRow {
    /// Budget not yet paid out to task completers.
    pub fn remaining_credits(&self) -> i64 {
        self.credits_allocated - self.credits_spent
    }

    pub fn is_fully_delivered(&self) -> bool {
        self.completed_actions >= self.target_actions
    }
}

/// Fields for a new campaign. New campaigns start `active` with nothing spent.
#[derive(Debug, Clone)]
pub struct NewCampaign<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub video_id: &'a str,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub target_actions: u32,
    pub credits_allocated: i64,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CampaignRow> {
    Ok(CampaignRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        video_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        target_actions: row.get(5)?,
        completed_actions: row.get(6)?,
        credits_allocated: row.get(7)?,
        credits_spent: row.get(8)?,
        status: text_enum(row, 9)?,
        created_at: ts(row, 10)?,
        updated_at: ts(row, 11)?,
    })
}

/// Insert a campaign in the `active` state.
pub fn insert(conn: &Connection, campaign: &NewCampaign<'_>, now: u64) -> Result<()> {
    conn.execute(
        "INSERT INTO campaigns (id, user_id, video_id, title, description, target_actions,
                                credits_allocated, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'active', ?8, ?8)",
        rusqlite::params![
            campaign.id,
            campaign.user_id,
            campaign.video_id,
            campaign.title,
            campaign.description,
            campaign.target_actions,
            campaign.credits_allocated,
            now as i64,
        ],
    )?;
    Ok(())
}

/// Get a campaign by id.
pub fn get(conn: &Connection, id: &str) -> Result<CampaignRow> {
    conn.query_row(
        &format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1"),
        [id],
        map_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("campaign {id}")),
        other => DbError::Sqlite(other),
    })
}

/// Set the campaign status.
pub fn set_status(conn: &Connection, id: &str, status: CampaignStatus, now: u64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE campaigns SET status = ?2, updated_at = ?3 WHERE id = ?1",
        rusqlite::params![id, status.as_str(), now as i64],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("campaign {id}")));
    }
    Ok(())
}

/// Count one delivered action paying `reward` credits.
///
/// The table CHECKs reject the update if it would overspend the budget or
/// exceed the target; that surfaces as a constraint violation.
pub fn add_completion(conn: &Connection, id: &str, reward: i64, now: u64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE campaigns SET
            completed_actions = completed_actions + 1,
            credits_spent = credits_spent + ?2,
            updated_at = ?3
         WHERE id = ?1",
        rusqlite::params![id, reward, now as i64],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("campaign {id}")));
    }
    Ok(())
}

/// Campaigns owned by a user, newest first.
pub fn list_by_user(conn: &Connection, user_id: &str) -> Result<Vec<CampaignRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE user_id = ?1
         ORDER BY created_at DESC, id"
    ))?;
    let rows = stmt
        .query_map([user_id], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Active campaigns, newest first.
pub fn list_active(conn: &Connection, limit: u32) -> Result<Vec<CampaignRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE status = 'active'
         ORDER BY created_at DESC, id LIMIT ?1"
    ))?;
    let rows = stmt
        .query_map([limit], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
