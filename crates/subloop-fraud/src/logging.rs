//! Fraud event logging.
//!
//! The risk score stored with each event is computed from the account's
//! logs over the previous 24 hours, before the new event is written.

use rusqlite::Connection;
use subloop_db::queries::fraud::{self, FraudLogRow};
use subloop_types::RiskLevel;

use crate::{FraudError, Result, DAY, HOUR};

const MAX_IP_LEN: usize = 50;
const MAX_DEVICE_LEN: usize = 200;
const MAX_EVENT_TYPE_LEN: usize = 100;

/// A client action to record.
#[derive(Debug, Clone)]
pub struct LogEvent<'a> {
    pub user_id: &'a str,
    pub ip_address: &'a str,
    pub device_fingerprint: &'a str,
    pub event_type: &'a str,
    pub details: serde_json::Value,
}

fn check_len(field: &'static str, value: &str, max: usize) -> Result<()> {
    let len = value.chars().count();
    if len == 0 || len > max {
        return Err(FraudError::InvalidField { field, max });
    }
    Ok(())
}

/// Risk score for a new event from `ip_address`, 0..=100.
pub fn event_risk_score(
    conn: &Connection,
    user_id: &str,
    ip_address: &str,
    now: u64,
) -> Result<u32> {
    let day_ago = now.saturating_sub(DAY);
    let (ips, devices) = fraud::distinct_sources_since(conn, user_id, day_ago)?;
    let last_hour = fraud::count_since(conn, user_id, None, now.saturating_sub(HOUR))?;
    let shared = fraud::other_users_on_ip(conn, ip_address, user_id, day_ago)?;

    let mut score = 0u32;
    if ips > 5 {
        score += 30;
    }
    if devices > 3 {
        score += 20;
    }
    if last_hour > 60 {
        score += 30;
    }
    if shared > 3 {
        score += 20;
    }
    Ok(score.min(100))
}

/// Validate, score and store an event. Returns the stored row.
pub fn log_event(conn: &Connection, event: LogEvent<'_>, now: u64) -> Result<FraudLogRow> {
    check_len("ip address", event.ip_address, MAX_IP_LEN)?;
    check_len("device fingerprint", event.device_fingerprint, MAX_DEVICE_LEN)?;
    check_len("event type", event.event_type, MAX_EVENT_TYPE_LEN)?;

    let risk_score = event_risk_score(conn, event.user_id, event.ip_address, now)?;
    let row = FraudLogRow {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: event.user_id.to_string(),
        ip_address: event.ip_address.to_string(),
        device_fingerprint: event.device_fingerprint.to_string(),
        event_type: event.event_type.to_string(),
        event_details: event.details,
        risk_score,
        created_at: now,
    };
    fraud::insert(conn, &row)?;

    if RiskLevel::from_score(risk_score) == RiskLevel::High {
        tracing::warn!(
            user_id = %row.user_id,
            event_type = %row.event_type,
            risk_score,
            "high-risk event logged"
        );
    } else {
        tracing::debug!(
            user_id = %row.user_id,
            event_type = %row.event_type,
            risk_score,
            "event logged"
        );
    }
    Ok(row)
}
