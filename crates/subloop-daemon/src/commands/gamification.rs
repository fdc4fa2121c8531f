//! Progression command handlers.
//!
//! The gamification functions take a plain connection; handlers that pay
//! credits wrap them in a transaction so a failed step leaves no partial
//! ledger entry behind.

use std::sync::Arc;

use serde_json::{json, Value};
use subloop_db::queries::profiles;
use subloop_gamification::achievements::achievement_status;
use subloop_types::events::{Event, EventType};
use subloop_types::TransactionType;

use super::profile::emit_credits_changed;
use super::{optional_u32, to_json, Result};
use crate::rpc::Caller;
use crate::{unix_now, DaemonState};

const DEFAULT_LEADERBOARD_LIMIT: u32 = 10;

pub async fn get_progress(state: &Arc<DaemonState>, caller: &Caller) -> Result {
    let db = state.db.lock().await;
    to_json(&subloop_gamification::progress(&db, &caller.user_id)?)
}

/// Daily check-in.
pub async fn update_streak(state: &Arc<DaemonState>, caller: &Caller) -> Result {
    let (update, balance) = {
        let mut db = state.db.lock().await;
        let tx = db.transaction()?;
        let update = subloop_gamification::update_streak(&tx, &caller.user_id, unix_now())?;
        let balance = profiles::credits(&tx, &caller.user_id)?;
        tx.commit()?;
        (update, balance)
    };

    if update.bonus_awarded {
        emit_credits_changed(state, &caller.user_id, balance, TransactionType::StreakBonus);
    }
    to_json(&update)
}

pub async fn claim_daily_reward(state: &Arc<DaemonState>, caller: &Caller) -> Result {
    let (reward, balance) = {
        let mut db = state.db.lock().await;
        let tx = db.transaction()?;
        let reward = subloop_gamification::claim_daily_reward(&tx, &caller.user_id, unix_now())?;
        let balance = profiles::credits(&tx, &caller.user_id)?;
        tx.commit()?;
        (reward, balance)
    };

    if reward.claimed {
        emit_credits_changed(state, &caller.user_id, balance, TransactionType::DailyReward);
    }
    to_json(&reward)
}

/// Unlock any achievements the caller now qualifies for.
pub async fn check_achievements(state: &Arc<DaemonState>, caller: &Caller) -> Result {
    let (unlocked, balance) = {
        let mut db = state.db.lock().await;
        let tx = db.transaction()?;
        let unlocked = subloop_gamification::check_achievements(&tx, &caller.user_id, unix_now())?;
        let balance = profiles::credits(&tx, &caller.user_id)?;
        tx.commit()?;
        (unlocked, balance)
    };

    let now = unix_now();
    for achievement in &unlocked {
        state.event_bus.emit(Event::for_user(
            EventType::AchievementUnlocked,
            caller.user_id.as_str(),
            now,
            json!({ "id": achievement.id, "name": achievement.name }),
        ));
    }
    if !unlocked.is_empty() {
        emit_credits_changed(state, &caller.user_id, balance, TransactionType::AchievementBonus);
    }
    Ok(json!({ "newly_unlocked": to_json(&unlocked)? }))
}

/// The whole catalog with the caller's progress against each entry.
pub async fn get_achievements(state: &Arc<DaemonState>, caller: &Caller) -> Result {
    let db = state.db.lock().await;
    to_json(&achievement_status(&db, &caller.user_id)?)
}

pub async fn get_leaderboard(state: &Arc<DaemonState>, params: &Value) -> Result {
    let limit = optional_u32(params, "limit")?.unwrap_or(DEFAULT_LEADERBOARD_LIMIT);
    let db = state.db.lock().await;
    to_json(&subloop_gamification::leaderboard(&db, limit)?)
}
