//! Task command handlers.

use std::sync::Arc;

use serde_json::{json, Value};
use subloop_db::queries::{campaigns, profiles};
use subloop_tasks::CompletionRequest;
use subloop_types::events::{Event, EventType};
use subloop_types::{TaskStatus, TaskType, TransactionType};
use tracing::info;

use super::profile::emit_credits_changed;
use super::{optional_enum, optional_str, optional_u32, required_str, to_json, Result};
use crate::rpc::Caller;
use crate::{unix_now, DaemonState};

/// Fingerprint recorded when the client sends none.
const UNKNOWN_DEVICE: &str = "unknown";

pub async fn get_available_tasks(
    state: &Arc<DaemonState>,
    caller: &Caller,
    params: &Value,
) -> Result {
    let task_type: Option<TaskType> = optional_enum(params, "task_type")?;
    let limit = optional_u32(params, "limit")?;
    let db = state.db.lock().await;
    to_json(&subloop_tasks::available_tasks(&db, &caller.user_id, task_type, limit)?)
}

pub async fn get_my_tasks(state: &Arc<DaemonState>, caller: &Caller, params: &Value) -> Result {
    let status: Option<TaskStatus> = optional_enum(params, "status")?;
    let db = state.db.lock().await;
    to_json(&subloop_tasks::user_tasks(&db, &caller.user_id, status)?)
}

/// Reserve a task for the caller.
pub async fn assign_task(state: &Arc<DaemonState>, caller: &Caller, params: &Value) -> Result {
    let task_id = required_str(params, "task_id")?;
    let db = state.db.lock().await;
    to_json(&subloop_tasks::assign_task(&db, &caller.user_id, task_id, unix_now())?)
}

/// Complete a task and publish everything it changed.
pub async fn complete_task(state: &Arc<DaemonState>, caller: &Caller, params: &Value) -> Result {
    let task_id = required_str(params, "task_id")?;
    let device_fingerprint = match caller.device_fingerprint.as_deref() {
        Some(fp) => fp,
        None => optional_str(params, "device_fingerprint")?.unwrap_or(UNKNOWN_DEVICE),
    };
    let req = CompletionRequest {
        user_id: &caller.user_id,
        task_id,
        ip_address: &caller.ip_address,
        device_fingerprint,
    };

    let (outcome, owner) = {
        let mut db = state.db.lock().await;
        let outcome = subloop_tasks::complete_task(
            &mut db,
            state.verifier.as_ref(),
            &req,
            &state.config.completion_policy(),
            unix_now(),
        )?;
        let owner = if outcome.campaign_completed {
            let campaign = campaigns::get(&db, &outcome.campaign_id)?;
            let balance = profiles::credits(&db, &campaign.user_id)?;
            Some((campaign.user_id, balance))
        } else {
            None
        };
        (outcome, owner)
    };

    let now = unix_now();
    let user_id = caller.user_id.as_str();
    state.event_bus.emit(Event::for_user(
        EventType::TaskCompleted,
        user_id,
        now,
        json!({
            "task_id": outcome.task_id,
            "task_type": outcome.task_type,
            "credits_awarded": outcome.credits_awarded,
        }),
    ));
    emit_credits_changed(state, user_id, outcome.new_balance, TransactionType::TaskReward);
    if outcome.xp.leveled_up {
        state.event_bus.emit(Event::for_user(
            EventType::LevelUp,
            user_id,
            now,
            json!({ "level": outcome.xp.new_level }),
        ));
    }
    for achievement in &outcome.achievements {
        state.event_bus.emit(Event::for_user(
            EventType::AchievementUnlocked,
            user_id,
            now,
            json!({ "id": achievement.id, "name": achievement.name }),
        ));
    }
    if let Some((owner_id, owner_balance)) = owner {
        info!(campaign_id = %outcome.campaign_id, "campaign delivered");
        state.event_bus.emit(Event::for_user(
            EventType::CampaignCompleted,
            owner_id.as_str(),
            now,
            json!({
                "campaign_id": outcome.campaign_id,
                "refunded": outcome.campaign_refunded,
            }),
        ));
        if outcome.campaign_refunded > 0 {
            emit_credits_changed(state, &owner_id, owner_balance, TransactionType::CampaignRefund);
        }
    }

    to_json(&outcome)
}

pub async fn get_task_stats(state: &Arc<DaemonState>, caller: &Caller) -> Result {
    let db = state.db.lock().await;
    to_json(&subloop_tasks::task_stats(&db, &caller.user_id)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::campaigns::create_campaign;
    use crate::test_support::{caller, fund, state};
    use subloop_types::Role;

    async fn launch(state: &Arc<DaemonState>, credits: i64, target: u32) -> String {
        fund(state, "u1", 100).await;
        let created = create_campaign(
            state,
            &caller("u1", Role::User),
            &json!({
                "title": "Launch",
                "video": {"url": "https://youtu.be/dQw4w9WgXcQ", "channel_id": "UC123"},
                "credits_allocated": credits,
                "target_actions": target,
            }),
        )
        .await
        .expect("campaign");
        created["campaign"]["id"].as_str().expect("id").to_string()
    }

    fn task_of(tasks: &Value, task_type: &str) -> String {
        tasks
            .as_array()
            .expect("array")
            .iter()
            .find(|t| t["task_type"] == task_type)
            .and_then(|t| t["id"].as_str())
            .expect("task of type")
            .to_string()
    }

    #[tokio::test]
    async fn test_assign_and_complete() {
        let state = state();
        launch(&state, 20, 3).await;
        let bob = caller("u2", Role::User);
        let mut events = state.event_bus.subscribe();

        let open = get_available_tasks(&state, &bob, &json!({})).await.expect("open");
        assert_eq!(open.as_array().expect("array").len(), 3);
        let watch = task_of(&open, "watch");

        let assigned = assign_task(&state, &bob, &json!({"task_id": watch}))
            .await
            .expect("assign");
        assert_eq!(assigned["status"], "in_progress");

        let outcome = complete_task(&state, &bob, &json!({"task_id": watch}))
            .await
            .expect("complete");
        assert_eq!(outcome["credits_awarded"], 1);
        // Watch reward plus the first-task achievement bonus.
        assert_eq!(outcome["new_balance"], 51);

        let first = events.try_recv().expect("task event");
        assert_eq!(first.event_type, EventType::TaskCompleted);
        assert!(first.visible_to("u2"));
        assert!(!first.visible_to("u1"));

        let mine = get_my_tasks(&state, &bob, &json!({"status": "completed"}))
            .await
            .expect("mine");
        assert_eq!(mine.as_array().expect("array").len(), 1);

        let stats = get_task_stats(&state, &bob).await.expect("stats");
        assert_eq!(stats["completed"], 1);
        assert_eq!(stats["total_earned"], 1);

        let err = complete_task(&state, &bob, &json!({"task_id": watch}))
            .await
            .expect_err("twice");
        assert_eq!(err.code, -32050);
    }

    #[tokio::test]
    async fn test_owner_cannot_complete_own_task() {
        let state = state();
        launch(&state, 20, 3).await;
        let bob = caller("u2", Role::User);
        let open = get_available_tasks(&state, &bob, &json!({"task_type": "like"}))
            .await
            .expect("open");
        let like = task_of(&open, "like");

        let err = complete_task(&state, &caller("u1", Role::User), &json!({"task_id": like}))
            .await
            .expect_err("self dealing");
        assert_eq!(err.code, -32055);
    }

    #[tokio::test]
    async fn test_last_action_completes_campaign() {
        let state = state();
        let campaign_id = launch(&state, 5, 1).await;
        let bob = caller("u2", Role::User);
        let open = get_available_tasks(&state, &bob, &json!({})).await.expect("open");
        let watch = task_of(&open, "watch");

        let mut events = state.event_bus.subscribe();
        let outcome = complete_task(&state, &bob, &json!({"task_id": watch}))
            .await
            .expect("complete");
        assert_eq!(outcome["campaign_completed"], true);
        assert_eq!(outcome["campaign_refunded"], 4);

        let kinds: Vec<EventType> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|e| e.event_type)
            .collect();
        assert!(kinds.contains(&EventType::CampaignCompleted));

        let db = state.db.lock().await;
        let campaign = campaigns::get(&db, &campaign_id).expect("campaign");
        assert_eq!(campaign.credits_spent, 1);
        // 100 funded, 5 allocated, 4 refunded.
        assert_eq!(profiles::credits(&db, "u1").expect("owner"), 99);
    }
}
