//! Credit and ledger command handlers.

use std::sync::Arc;

use serde_json::{json, Value};
use subloop_db::queries::profiles;
use subloop_types::TransactionType;
use tracing::info;

use super::profile::emit_credits_changed;
use super::{optional_str, optional_u32, required_i64, required_str, to_json, Result};
use crate::rpc::Caller;
use crate::{unix_now, DaemonState};

const DEFAULT_HISTORY_LIMIT: u32 = 50;
const DEFAULT_CHART_DAYS: u32 = 30;

/// The caller's balance.
pub async fn get_credit_balance(state: &Arc<DaemonState>, caller: &Caller) -> Result {
    let db = state.db.lock().await;
    let credits = profiles::credits(&db, &caller.user_id)?;
    Ok(json!({ "credits": credits }))
}

/// A page of the caller's ledger, newest first.
pub async fn get_transaction_history(
    state: &Arc<DaemonState>,
    caller: &Caller,
    params: &Value,
) -> Result {
    let limit = optional_u32(params, "limit")?.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let offset = optional_u32(params, "offset")?.unwrap_or(0);
    let db = state.db.lock().await;
    let rows = subloop_ledger::history(&db, &caller.user_id, limit, offset)?;
    to_json(&rows)
}

pub async fn get_credit_stats(state: &Arc<DaemonState>, caller: &Caller) -> Result {
    let db = state.db.lock().await;
    let stats = subloop_ledger::credit_stats(&db, &caller.user_id, unix_now())?;
    to_json(&stats)
}

/// Earned/spent per day for the last `days` days.
pub async fn get_earnings_chart(
    state: &Arc<DaemonState>,
    caller: &Caller,
    params: &Value,
) -> Result {
    let days = optional_u32(params, "days")?.unwrap_or(DEFAULT_CHART_DAYS);
    let db = state.db.lock().await;
    let chart = subloop_ledger::earnings_chart(&db, &caller.user_id, days, unix_now())?;
    to_json(&chart)
}

/// Credit or debit any account. Admin only.
pub async fn admin_add_credits(
    state: &Arc<DaemonState>,
    caller: &Caller,
    params: &Value,
) -> Result {
    let user_id = required_str(params, "user_id")?;
    let amount = required_i64(params, "amount")?;
    let description = optional_str(params, "description")?
        .map(str::to_string)
        .unwrap_or_else(|| format!("Adjustment by {}", caller.user_id));

    let balance = {
        let mut db = state.db.lock().await;
        subloop_ledger::add_credits_atomic(
            &mut db,
            user_id,
            amount,
            TransactionType::AdminAdjustment,
            Some(&description),
            Some(&caller.user_id),
            unix_now(),
        )?
    };

    info!(admin = %caller.user_id, user_id, amount, "admin credit adjustment");
    emit_credits_changed(state, user_id, balance, TransactionType::AdminAdjustment);
    Ok(json!({ "user_id": user_id, "new_balance": balance }))
}

/// Every account whose stored balance disagrees with its ledger. Admin only.
pub async fn audit_ledger(state: &Arc<DaemonState>) -> Result {
    let db = state.db.lock().await;
    let mismatches = subloop_ledger::audit_all(&db)?;
    if !mismatches.is_empty() {
        tracing::error!(count = mismatches.len(), "ledger audit found mismatched balances");
    }
    Ok(json!({
        "consistent": mismatches.is_empty(),
        "mismatches": to_json(&mismatches)?,
    }))
}
