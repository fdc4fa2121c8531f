//! Moderation command handlers.

use std::sync::Arc;

use serde_json::{json, Value};
use subloop_db::queries::moderation as moderation_db;
use subloop_moderation::reports::AUTO_FLAG_REPORT_COUNT;
use subloop_moderation::{BanRequest, NewReport};
use subloop_types::events::{Event, EventType};
use subloop_types::{AppealStatus, BanType, ContentType, ReportStatus};
use tracing::info;

use super::{
    optional_enum, optional_str, optional_u32, optional_u64, required_enum, required_str, to_json,
    Result,
};
use crate::rpc::{Caller, RpcError};
use crate::{unix_now, DaemonState};

const DEFAULT_ADMIN_LIST_LIMIT: u32 = 100;
const SECONDS_PER_HOUR: u64 = 3_600;

/// Report a piece of content. Repeatedly reported content is queued.
pub async fn create_report(state: &Arc<DaemonState>, caller: &Caller, params: &Value) -> Result {
    let content_type: ContentType = required_enum(params, "content_type")?;
    let report = NewReport {
        reporter_id: &caller.user_id,
        content_type,
        content_id: required_str(params, "content_id")?,
        reason: required_str(params, "reason")?,
        description: optional_str(params, "description")?,
    };

    let (row, pending) = {
        let db = state.db.lock().await;
        let row = subloop_moderation::create_report(&db, &report, unix_now())?;
        let pending = moderation_db::pending_reports_for(&db, content_type, &row.content_id)?;
        (row, pending.len())
    };

    if pending > AUTO_FLAG_REPORT_COUNT {
        state.event_bus.emit(Event::broadcast(
            EventType::ContentFlagged,
            unix_now(),
            json!({
                "content_type": row.content_type,
                "content_id": row.content_id,
                "report_count": pending,
            }),
        ));
    }
    to_json(&row)
}

/// Resolve or dismiss a report. Admin only.
pub async fn review_report(state: &Arc<DaemonState>, caller: &Caller, params: &Value) -> Result {
    let report_id = required_str(params, "report_id")?;
    let status: ReportStatus = required_enum(params, "status")?;
    let notes = optional_str(params, "notes")?;
    let db = state.db.lock().await;
    to_json(&subloop_moderation::review_report(
        &db,
        report_id,
        &caller.user_id,
        status,
        notes,
        unix_now(),
    )?)
}

/// Ban an account. Admin only.
///
/// Temporary bans take either `expires_at` (unix seconds) or
/// `duration_hours`.
pub async fn ban_user(state: &Arc<DaemonState>, caller: &Caller, params: &Value) -> Result {
    let user_id = required_str(params, "user_id")?;
    let reason = required_str(params, "reason")?;
    let ban_type: BanType = required_enum(params, "ban_type")?;
    let now = unix_now();
    let expires_at = match (
        optional_u64(params, "expires_at")?,
        optional_u64(params, "duration_hours")?,
    ) {
        (Some(_), Some(_)) => {
            return Err(RpcError::invalid_params(
                "give either expires_at or duration_hours, not both",
            ))
        }
        (Some(at), None) => Some(at),
        (None, Some(hours)) => Some(now.saturating_add(hours.saturating_mul(SECONDS_PER_HOUR))),
        (None, None) => None,
    };

    let ban = {
        let db = state.db.lock().await;
        subloop_moderation::ban_user(
            &db,
            &BanRequest {
                user_id,
                banned_by: &caller.user_id,
                reason,
                ban_type,
                expires_at,
            },
            now,
        )?
    };

    state.event_bus.emit(Event::for_user(
        EventType::UserBanned,
        user_id,
        now,
        json!({
            "ban_id": ban.id,
            "ban_type": ban.ban_type,
            "expires_at": ban.expires_at,
        }),
    ));
    to_json(&ban)
}

/// Lift a ban. Admin only.
pub async fn unban_user(state: &Arc<DaemonState>, params: &Value) -> Result {
    let ban_id = required_str(params, "ban_id")?;
    let db = state.db.lock().await;
    subloop_moderation::unban(&db, ban_id)?;
    Ok(json!({ "ban_id": ban_id, "lifted": true }))
}

/// Appeal one of the caller's bans.
pub async fn submit_appeal(state: &Arc<DaemonState>, caller: &Caller, params: &Value) -> Result {
    let ban_id = required_str(params, "ban_id")?;
    let text = required_str(params, "appeal_text")?;
    let db = state.db.lock().await;
    to_json(&subloop_moderation::submit_appeal(
        &db,
        ban_id,
        &caller.user_id,
        text,
        unix_now(),
    )?)
}

/// Approve or deny a pending appeal. Admin only.
pub async fn process_appeal(state: &Arc<DaemonState>, caller: &Caller, params: &Value) -> Result {
    let ban_id = required_str(params, "ban_id")?;
    let decision: AppealStatus = required_enum(params, "decision")?;
    let db = state.db.lock().await;
    let ban = subloop_moderation::process_appeal(
        &db,
        ban_id,
        decision,
        &caller.user_id,
        unix_now(),
    )?;
    info!(ban_id, user_id = %ban.user_id, %decision, "appeal decided");
    to_json(&ban)
}

/// Admin only.
pub async fn get_moderation_queue(state: &Arc<DaemonState>, params: &Value) -> Result {
    let priority = optional_enum(params, "priority")?;
    let status = optional_enum(params, "status")?;
    let limit = optional_u32(params, "limit")?;
    let db = state.db.lock().await;
    to_json(&subloop_moderation::moderation_queue(&db, priority, status, limit)?)
}

/// Decide a queue item. Admin only.
pub async fn moderate_content(state: &Arc<DaemonState>, caller: &Caller, params: &Value) -> Result {
    let queue_id = required_str(params, "queue_id")?;
    let decision = required_enum(params, "decision")?;
    let notes = optional_str(params, "notes")?;
    let db = state.db.lock().await;
    to_json(&subloop_moderation::moderate_content(
        &db,
        queue_id,
        &caller.user_id,
        decision,
        notes,
        unix_now(),
    )?)
}

/// Score a piece of text for spam.
pub fn check_spam(params: &Value) -> Result {
    let content = optional_str(params, "content")?.unwrap_or_default();
    to_json(&subloop_moderation::check_spam(content)?)
}

pub async fn get_my_reports(state: &Arc<DaemonState>, caller: &Caller) -> Result {
    let db = state.db.lock().await;
    to_json(&subloop_moderation::user_reports(&db, &caller.user_id)?)
}

pub async fn get_my_bans(state: &Arc<DaemonState>, caller: &Caller) -> Result {
    let db = state.db.lock().await;
    to_json(&subloop_moderation::user_bans(&db, &caller.user_id)?)
}

/// Whether the caller is currently banned, and by which ban.
pub async fn check_user_banned(state: &Arc<DaemonState>, caller: &Caller) -> Result {
    let db = state.db.lock().await;
    let ban = subloop_moderation::active_ban(&db, &caller.user_id, unix_now())?;
    Ok(json!({
        "is_banned": ban.is_some(),
        "ban": to_json(&ban)?,
    }))
}

pub async fn get_all_reports(state: &Arc<DaemonState>, params: &Value) -> Result {
    let limit = optional_u32(params, "limit")?.unwrap_or(DEFAULT_ADMIN_LIST_LIMIT);
    let db = state.db.lock().await;
    to_json(&subloop_moderation::all_reports(&db, limit)?)
}

pub async fn get_all_bans(state: &Arc<DaemonState>, params: &Value) -> Result {
    let limit = optional_u32(params, "limit")?.unwrap_or(DEFAULT_ADMIN_LIST_LIMIT);
    let db = state.db.lock().await;
    to_json(&subloop_moderation::all_bans(&db, limit)?)
}
