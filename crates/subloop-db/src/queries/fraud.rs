//! Fraud log query functions.

use rusqlite::Connection;
use serde::Serialize;

use super::ts;
use crate::{DbError, Result};

const LOG_COLUMNS: &str = "id, user_id, ip_address, device_fingerprint, event_type, event_details,
     risk_score, created_at";

/// A fraud log row.
#[derive(Debug, Clone, Serialize)]
pub struct FraudLogRow {
    pub id: String,
    pub user_id: String,
    pub ip_address: String,
    pub device_fingerprint: String,
    pub event_type: String,
    pub event_details: serde_json::Value,
    pub risk_score: u32,
    pub created_at: u64,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FraudLogRow> {
    let details: String = row.get(5)?;
    let event_details = serde_json::from_str(&details).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(FraudLogRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        ip_address: row.get(2)?,
        device_fingerprint: row.get(3)?,
        event_type: row.get(4)?,
        event_details,
        risk_score: row.get(6)?,
        created_at: ts(row, 7)?,
    })
}

/// Insert a log row.
pub fn insert(conn: &Connection, log: &FraudLogRow) -> Result<()> {
    let details = serde_json::to_string(&log.event_details)
        .map_err(|e| DbError::Serialization(e.to_string()))?;
    conn.execute(
        &format!("INSERT INTO fraud_logs ({LOG_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
        rusqlite::params![
            log.id,
            log.user_id,
            log.ip_address,
            log.device_fingerprint,
            log.event_type,
            details,
            log.risk_score,
            log.created_at as i64,
        ],
    )?;
    Ok(())
}

/// Most recent logs for a user.
pub fn recent_for_user(conn: &Connection, user_id: &str, limit: u32) -> Result<Vec<FraudLogRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {LOG_COLUMNS} FROM fraud_logs WHERE user_id = ?1
         ORDER BY created_at DESC, rowid DESC LIMIT ?2"
    ))?;
    let rows = stmt
        .query_map(rusqlite::params![user_id, limit], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Number of logs for a user since `since`, optionally of one event type.
pub fn count_since(
    conn: &Connection,
    user_id: &str,
    event_type: Option<&str>,
    since: u64,
) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM fraud_logs
         WHERE user_id = ?1 AND created_at >= ?2 AND (?3 IS NULL OR event_type = ?3)",
        rusqlite::params![user_id, since as i64, event_type],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

/// Distinct IPs and device fingerprints a user logged from since `since`.
pub fn distinct_sources_since(conn: &Connection, user_id: &str, since: u64) -> Result<(u64, u64)> {
    let (ips, devices): (i64, i64) = conn.query_row(
        "SELECT COUNT(DISTINCT ip_address), COUNT(DISTINCT device_fingerprint)
         FROM fraud_logs WHERE user_id = ?1 AND created_at >= ?2",
        rusqlite::params![user_id, since as i64],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok((ips as u64, devices as u64))
}

/// Number of other users seen on `ip` since `since`.
pub fn other_users_on_ip(conn: &Connection, ip: &str, user_id: &str, since: u64) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(DISTINCT user_id) FROM fraud_logs
         WHERE ip_address = ?1 AND user_id != ?2 AND created_at >= ?3",
        rusqlite::params![ip, user_id, since as i64],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

/// All logs in `[start, end]`, oldest first.
pub fn between(conn: &Connection, start: u64, end: u64) -> Result<Vec<FraudLogRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {LOG_COLUMNS} FROM fraud_logs WHERE created_at BETWEEN ?1 AND ?2
         ORDER BY created_at, rowid"
    ))?;
    let rows = stmt
        .query_map(rusqlite::params![start as i64, end as i64], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
