//! Fraud command handlers.

use std::sync::Arc;

use serde_json::Value;
use subloop_fraud::LogEvent;

use super::{optional_str, optional_u32, optional_u64, required_str, to_json, Result};
use crate::rpc::{Caller, RpcError};
use crate::{unix_now, DaemonState};

/// Record a client-side event against the caller.
///
/// The IP address always comes from the connection, never from params.
pub async fn log_fraud_event(state: &Arc<DaemonState>, caller: &Caller, params: &Value) -> Result {
    let event_type = required_str(params, "event_type")?;
    let device_fingerprint = match caller.device_fingerprint.as_deref() {
        Some(fp) => fp,
        None => required_str(params, "device_fingerprint")?,
    };
    let details = params
        .get("details")
        .cloned()
        .unwrap_or_else(|| Value::Object(Default::default()));

    let db = state.db.lock().await;
    let row = subloop_fraud::log_event(
        &db,
        LogEvent {
            user_id: &caller.user_id,
            ip_address: &caller.ip_address,
            device_fingerprint,
            event_type,
            details,
        },
        unix_now(),
    )?;
    to_json(&row)
}

/// Fraud check for the caller, or for any account when called by an admin.
pub async fn check_user_fraud(state: &Arc<DaemonState>, caller: &Caller, params: &Value) -> Result {
    let user_id = optional_str(params, "user_id")?.unwrap_or(&caller.user_id);
    if user_id != caller.user_id && !caller.is_admin() {
        return Err(RpcError::forbidden("admin role required to check another user"));
    }
    let db = state.db.lock().await;
    to_json(&subloop_fraud::check_user(&db, user_id, unix_now())?)
}

/// Platform-wide fraud statistics. Admin only.
pub async fn get_fraud_analytics(state: &Arc<DaemonState>, params: &Value) -> Result {
    let start = optional_u64(params, "start")?;
    let end = optional_u64(params, "end")?;
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(RpcError::invalid_params("start must not be after end"));
        }
    }
    let db = state.db.lock().await;
    to_json(&subloop_fraud::analytics(&db, start, end, unix_now())?)
}

/// How many more times the caller may perform `action` in the window.
pub async fn rate_limit_check(state: &Arc<DaemonState>, caller: &Caller, params: &Value) -> Result {
    let action = required_str(params, "action")?;
    let limit = optional_u32(params, "limit")?;
    let window_minutes = optional_u32(params, "window_minutes")?;
    let db = state.db.lock().await;
    to_json(&subloop_fraud::rate_limit_check(
        &db,
        &caller.user_id,
        action,
        limit,
        window_minutes,
        unix_now(),
    )?)
}
