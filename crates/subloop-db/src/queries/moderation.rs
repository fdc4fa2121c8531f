//! Content report, moderation queue and ban query functions.

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use subloop_types::{
    AppealStatus, BanType, ContentType, QueuePriority, QueueStatus, ReportStatus,
};

use super::{opt_ts, text_enum, ts};
use crate::{DbError, Result};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

const REPORT_COLUMNS: &str = "id, reporter_id, content_type, content_id, reason, description,
     status, reviewed_by, reviewed_at, resolution_notes, created_at";

/// A content report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub id: String,
    pub reporter_id: String,
    pub content_type: ContentType,
    pub content_id: String,
    pub reason: String,
    pub description: Option<String>,
    pub status: ReportStatus,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<u64>,
    pub resolution_notes: Option<String>,
    pub created_at: u64,
}

fn map_report(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReportRow> {
    Ok(ReportRow {
        id: row.get(0)?,
        reporter_id: row.get(1)?,
        content_type: text_enum(row, 2)?,
        content_id: row.get(3)?,
        reason: row.get(4)?,
        description: row.get(5)?,
        status: text_enum(row, 6)?,
        reviewed_by: row.get(7)?,
        reviewed_at: opt_ts(row, 8)?,
        resolution_notes: row.get(9)?,
        created_at: ts(row, 10)?,
    })
}

/// Insert a pending report.
#[allow(clippy::too_many_arguments)]
pub fn insert_report(
    conn: &Connection,
    id: &str,
    reporter_id: &str,
    content_type: ContentType,
    content_id: &str,
    reason: &str,
    description: Option<&str>,
    now: u64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO content_reports
            (id, reporter_id, content_type, content_id, reason, description, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7)",
        rusqlite::params![
            id,
            reporter_id,
            content_type.as_str(),
            content_id,
            reason,
            description,
            now as i64,
        ],
    )?;
    Ok(())
}

/// Get a report by id.
pub fn get_report(conn: &Connection, id: &str) -> Result<ReportRow> {
    conn.query_row(
        &format!("SELECT {REPORT_COLUMNS} FROM content_reports WHERE id = ?1"),
        [id],
        map_report,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("report {id}")),
        other => DbError::Sqlite(other),
    })
}

/// Pending reports against one piece of content.
pub fn pending_reports_for(
    conn: &Connection,
    content_type: ContentType,
    content_id: &str,
) -> Result<Vec<ReportRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REPORT_COLUMNS} FROM content_reports
         WHERE content_type = ?1 AND content_id = ?2 AND status = 'pending'
         ORDER BY created_at, rowid"
    ))?;
    let rows = stmt
        .query_map(rusqlite::params![content_type.as_str(), content_id], map_report)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Record a review decision on a report.
pub fn review_report(
    conn: &Connection,
    id: &str,
    reviewer: &str,
    status: ReportStatus,
    notes: Option<&str>,
    now: u64,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE content_reports SET status = ?2, reviewed_by = ?3, reviewed_at = ?4,
                resolution_notes = ?5
         WHERE id = ?1",
        rusqlite::params![id, status.as_str(), reviewer, now as i64, notes],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("report {id}")));
    }
    Ok(())
}

/// Reports filed by a user, newest first.
pub fn reports_by_reporter(conn: &Connection, reporter_id: &str) -> Result<Vec<ReportRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REPORT_COLUMNS} FROM content_reports WHERE reporter_id = ?1
         ORDER BY created_at DESC, rowid DESC"
    ))?;
    let rows = stmt
        .query_map([reporter_id], map_report)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// All reports, newest first.
pub fn all_reports(conn: &Connection, limit: u32) -> Result<Vec<ReportRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REPORT_COLUMNS} FROM content_reports
         ORDER BY created_at DESC, rowid DESC LIMIT ?1"
    ))?;
    let rows = stmt
        .query_map([limit], map_report)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Moderation queue
// ---------------------------------------------------------------------------

const QUEUE_COLUMNS: &str = "id, content_type, content_id, flag_reasons, auto_flagged, priority,
     status, reviewed_by, reviewed_at, review_notes, created_at, updated_at";

/// A moderation queue item.
#[derive(Debug, Clone, Serialize)]
pub struct QueueRow {
    pub id: String,
    pub content_type: ContentType,
    pub content_id: String,
    pub flag_reasons: Vec<String>,
    pub auto_flagged: bool,
    pub priority: QueuePriority,
    pub status: QueueStatus,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<u64>,
    pub review_notes: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
}

fn map_queue(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueueRow> {
    let reasons: String = row.get(3)?;
    let flag_reasons = serde_json::from_str(&reasons).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(QueueRow {
        id: row.get(0)?,
        content_type: text_enum(row, 1)?,
        content_id: row.get(2)?,
        flag_reasons,
        auto_flagged: row.get(4)?,
        priority: text_enum(row, 5)?,
        status: text_enum(row, 6)?,
        reviewed_by: row.get(7)?,
        reviewed_at: opt_ts(row, 8)?,
        review_notes: row.get(9)?,
        created_at: ts(row, 10)?,
        updated_at: ts(row, 11)?,
    })
}

fn encode_reasons(reasons: &[String]) -> Result<String> {
    serde_json::to_string(reasons).map_err(|e| DbError::Serialization(e.to_string()))
}

/// The queue item for a piece of content, if any.
pub fn queue_item_for(
    conn: &Connection,
    content_type: ContentType,
    content_id: &str,
) -> Result<Option<QueueRow>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {QUEUE_COLUMNS} FROM moderation_queue
                 WHERE content_type = ?1 AND content_id = ?2"
            ),
            rusqlite::params![content_type.as_str(), content_id],
            map_queue,
        )
        .optional()?;
    Ok(row)
}

/// Get a queue item by id.
pub fn get_queue_item(conn: &Connection, id: &str) -> Result<QueueRow> {
    conn.query_row(
        &format!("SELECT {QUEUE_COLUMNS} FROM moderation_queue WHERE id = ?1"),
        [id],
        map_queue,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("queue item {id}")),
        other => DbError::Sqlite(other),
    })
}

/// Insert a pending queue item.
#[allow(clippy::too_many_arguments)]
pub fn insert_queue_item(
    conn: &Connection,
    id: &str,
    content_type: ContentType,
    content_id: &str,
    reasons: &[String],
    auto_flagged: bool,
    priority: QueuePriority,
    now: u64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO moderation_queue
            (id, content_type, content_id, flag_reasons, auto_flagged, priority, status,
             created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7, ?7)",
        rusqlite::params![
            id,
            content_type.as_str(),
            content_id,
            encode_reasons(reasons)?,
            auto_flagged,
            priority.as_str(),
            now as i64,
        ],
    )?;
    Ok(())
}

/// Replace an item's reasons and priority and put it back to pending.
pub fn reflag_queue_item(
    conn: &Connection,
    id: &str,
    reasons: &[String],
    priority: QueuePriority,
    now: u64,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE moderation_queue SET flag_reasons = ?2, priority = ?3, auto_flagged = 1,
                status = 'pending', updated_at = ?4
         WHERE id = ?1",
        rusqlite::params![id, encode_reasons(reasons)?, priority.as_str(), now as i64],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("queue item {id}")));
    }
    Ok(())
}

/// Record a moderator decision on a queue item.
pub fn review_queue_item(
    conn: &Connection,
    id: &str,
    reviewer: &str,
    status: QueueStatus,
    notes: Option<&str>,
    now: u64,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE moderation_queue SET status = ?2, reviewed_by = ?3, reviewed_at = ?4,
                review_notes = ?5, updated_at = ?4
         WHERE id = ?1",
        rusqlite::params![id, status.as_str(), reviewer, now as i64, notes],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("queue item {id}")));
    }
    Ok(())
}

/// Queue items, most urgent first, then oldest first.
pub fn list_queue(
    conn: &Connection,
    priority: Option<QueuePriority>,
    status: Option<QueueStatus>,
    limit: u32,
) -> Result<Vec<QueueRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {QUEUE_COLUMNS} FROM moderation_queue
         WHERE (?1 IS NULL OR priority = ?1) AND (?2 IS NULL OR status = ?2)
         ORDER BY CASE priority
                    WHEN 'urgent' THEN 3
                    WHEN 'high' THEN 2
                    WHEN 'medium' THEN 1
                    ELSE 0
                  END DESC,
                  created_at ASC, rowid ASC
         LIMIT ?3"
    ))?;
    let rows = stmt
        .query_map(
            rusqlite::params![
                priority.map(|p| p.as_str()),
                status.map(|s| s.as_str()),
                limit
            ],
            map_queue,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Bans
// ---------------------------------------------------------------------------

const BAN_COLUMNS: &str = "id, user_id, banned_by, reason, ban_type, expires_at, appeal_text,
     appeal_status, appeal_submitted_at, appeal_reviewed_by, appeal_reviewed_at, created_at";

/// A ban row.
#[derive(Debug, Clone, Serialize)]
pub struct BanRow {
    pub id: String,
    pub user_id: String,
    pub banned_by: String,
    pub reason: String,
    pub ban_type: BanType,
    pub expires_at: Option<u64>,
    pub appeal_text: Option<String>,
    pub appeal_status: Option<AppealStatus>,
    pub appeal_submitted_at: Option<u64>,
    pub appeal_reviewed_by: Option<String>,
    pub appeal_reviewed_at: Option<u64>,
    pub created_at: u64,
}

impl BanRow {
    /// Whether the ban restricts the user at time `now`.
    pub fn is_active(&self, now: u64) -> bool {
        if self.appeal_status == Some(AppealStatus::Approved) {
            return false;
        }
        match self.ban_type {
            BanType::Permanent => true,
            BanType::Temporary => self.expires_at.is_some_and(|exp| exp > now),
        }
    }
}

fn map_ban(row: &rusqlite::Row<'_>) -> rusqlite::Result<BanRow> {
    let appeal_status = match row.get::<_, Option<String>>(7)? {
        Some(raw) => Some(raw.parse::<AppealStatus>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?),
        None => None,
    };
    Ok(BanRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        banned_by: row.get(2)?,
        reason: row.get(3)?,
        ban_type: text_enum(row, 4)?,
        expires_at: opt_ts(row, 5)?,
        appeal_text: row.get(6)?,
        appeal_status,
        appeal_submitted_at: opt_ts(row, 8)?,
        appeal_reviewed_by: row.get(9)?,
        appeal_reviewed_at: opt_ts(row, 10)?,
        created_at: ts(row, 11)?,
    })
}

/// Insert a ban.
#[allow(clippy::too_many_arguments)]
pub fn insert_ban(
    conn: &Connection,
    id: &str,
    user_id: &str,
    banned_by: &str,
    reason: &str,
    ban_type: BanType,
    expires_at: Option<u64>,
    now: u64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO user_bans (id, user_id, banned_by, reason, ban_type, expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            id,
            user_id,
            banned_by,
            reason,
            ban_type.as_str(),
            expires_at.map(|v| v as i64),
            now as i64,
        ],
    )?;
    Ok(())
}

/// Get a ban by id.
pub fn get_ban(conn: &Connection, id: &str) -> Result<BanRow> {
    conn.query_row(
        &format!("SELECT {BAN_COLUMNS} FROM user_bans WHERE id = ?1"),
        [id],
        map_ban,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("ban {id}")),
        other => DbError::Sqlite(other),
    })
}

/// Delete a ban.
pub fn delete_ban(conn: &Connection, id: &str) -> Result<()> {
    let deleted = conn.execute("DELETE FROM user_bans WHERE id = ?1", [id])?;
    if deleted == 0 {
        return Err(DbError::NotFound(format!("ban {id}")));
    }
    Ok(())
}

/// Bans against a user, newest first.
pub fn bans_for_user(conn: &Connection, user_id: &str) -> Result<Vec<BanRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BAN_COLUMNS} FROM user_bans WHERE user_id = ?1
         ORDER BY created_at DESC, rowid DESC"
    ))?;
    let rows = stmt
        .query_map([user_id], map_ban)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// All bans, newest first.
pub fn all_bans(conn: &Connection, limit: u32) -> Result<Vec<BanRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BAN_COLUMNS} FROM user_bans ORDER BY created_at DESC, rowid DESC LIMIT ?1"
    ))?;
    let rows = stmt
        .query_map([limit], map_ban)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Attach a pending appeal to a ban.
pub fn set_appeal(conn: &Connection, id: &str, text: &str, now: u64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE user_bans SET appeal_text = ?2, appeal_status = 'pending',
                appeal_submitted_at = ?3
         WHERE id = ?1",
        rusqlite::params![id, text, now as i64],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("ban {id}")));
    }
    Ok(())
}

/// Record the outcome of an appeal.
pub fn review_appeal(
    conn: &Connection,
    id: &str,
    status: AppealStatus,
    reviewer: &str,
    now: u64,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE user_bans SET appeal_status = ?2, appeal_reviewed_by = ?3,
                appeal_reviewed_at = ?4
         WHERE id = ?1",
        rusqlite::params![id, status.as_str(), reviewer, now as i64],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("ban {id}")));
    }
    Ok(())
}
