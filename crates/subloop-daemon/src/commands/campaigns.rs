//! Campaign command handlers.

use std::sync::Arc;

use serde_json::{json, Value};
use subloop_campaign::catalog::VideoInput;
use subloop_campaign::plan::minimum_budget;
use subloop_campaign::{analytics, lifecycle, plan_tasks, CreateCampaign};
use subloop_db::queries::{campaigns, profiles};
use subloop_types::events::{Event, EventType};
use subloop_types::{CampaignStatus, TransactionType};

use super::profile::emit_credits_changed;
use super::{
    optional_str, optional_u32, required_enum, required_i64, required_str, required_u32, to_json,
    Result,
};
use crate::rpc::{Caller, RpcError};
use crate::{unix_now, DaemonState};

const DEFAULT_ACTIVE_LIMIT: u32 = 20;
const DEFAULT_PERFORMANCE_DAYS: u32 = 30;

/// The video to promote: either a `video` object or a bare `video_url`.
fn video_input(params: &Value) -> std::result::Result<VideoInput, RpcError> {
    if let Some(video) = params.get("video").filter(|v| !v.is_null()) {
        return serde_json::from_value(video.clone())
            .map_err(|e| RpcError::invalid_params(&format!("video: {e}")));
    }
    Ok(VideoInput {
        url: required_str(params, "video_url")?.to_string(),
        ..Default::default()
    })
}

/// Campaigns are visible to their owner and to admins.
fn check_owner(
    conn: &rusqlite::Connection,
    caller: &Caller,
    campaign_id: &str,
) -> std::result::Result<(), RpcError> {
    let campaign = campaigns::get(conn, campaign_id)?;
    if campaign.user_id != caller.user_id && !caller.is_admin() {
        return Err(RpcError::forbidden("not the campaign owner"));
    }
    Ok(())
}

/// Spend credits to promote a video.
pub async fn create_campaign(state: &Arc<DaemonState>, caller: &Caller, params: &Value) -> Result {
    let target_actions = required_u32(params, "target_actions")?;
    let req = CreateCampaign {
        owner_id: caller.user_id.clone(),
        title: required_str(params, "title")?.to_string(),
        description: optional_str(params, "description")?.map(str::to_string),
        video: video_input(params)?,
        credits_allocated: required_i64(params, "credits_allocated")?,
        target_actions,
    };

    let created = {
        let mut db = state.db.lock().await;
        lifecycle::create_campaign(&mut db, &req, &state.config.plan_limits(), unix_now())?
    };

    state.event_bus.emit(Event::for_user(
        EventType::CampaignCreated,
        caller.user_id.as_str(),
        unix_now(),
        json!({
            "campaign_id": created.campaign.id,
            "title": created.campaign.title,
            "tasks_created": created.tasks_created,
        }),
    ));
    emit_credits_changed(
        state,
        &caller.user_id,
        created.owner_balance,
        TransactionType::CampaignBudget,
    );
    to_json(&created)
}

/// Pause, resume, cancel or complete a campaign.
pub async fn update_campaign_status(
    state: &Arc<DaemonState>,
    caller: &Caller,
    params: &Value,
) -> Result {
    let campaign_id = required_str(params, "campaign_id")?;
    let next: CampaignStatus = required_enum(params, "status")?;

    let (change, owner_balance) = {
        let mut db = state.db.lock().await;
        let change = lifecycle::update_status(
            &mut db,
            campaign_id,
            &caller.user_id,
            caller.is_admin(),
            next,
            unix_now(),
        )?;
        let balance = profiles::credits(&db, &change.campaign.user_id)?;
        (change, balance)
    };

    let owner = change.campaign.user_id.as_str();
    state.event_bus.emit(Event::for_user(
        EventType::CampaignStatusChanged,
        owner,
        unix_now(),
        json!({
            "campaign_id": change.campaign.id,
            "from": change.previous,
            "to": change.campaign.status,
        }),
    ));
    if change.refunded > 0 {
        emit_credits_changed(state, owner, owner_balance, TransactionType::CampaignRefund);
    }
    to_json(&change)
}

pub async fn get_campaign_analytics(
    state: &Arc<DaemonState>,
    caller: &Caller,
    params: &Value,
) -> Result {
    let campaign_id = required_str(params, "campaign_id")?;
    let db = state.db.lock().await;
    check_owner(&db, caller, campaign_id)?;
    to_json(&analytics::analytics(&db, campaign_id)?)
}

/// Deliveries per day for the last `days` days.
pub async fn get_campaign_performance(
    state: &Arc<DaemonState>,
    caller: &Caller,
    params: &Value,
) -> Result {
    let campaign_id = required_str(params, "campaign_id")?;
    let days = optional_u32(params, "days")?.unwrap_or(DEFAULT_PERFORMANCE_DAYS);
    let db = state.db.lock().await;
    check_owner(&db, caller, campaign_id)?;
    to_json(&analytics::performance(&db, campaign_id, days, unix_now())?)
}

pub async fn get_my_campaigns(state: &Arc<DaemonState>, caller: &Caller) -> Result {
    let db = state.db.lock().await;
    to_json(&lifecycle::user_campaigns(&db, &caller.user_id)?)
}

pub async fn get_active_campaigns(state: &Arc<DaemonState>, params: &Value) -> Result {
    let limit = optional_u32(params, "limit")?.unwrap_or(DEFAULT_ACTIVE_LIMIT);
    let db = state.db.lock().await;
    to_json(&lifecycle::active_campaigns(&db, limit)?)
}

/// The task allocation a campaign would get, without creating it.
pub fn preview_campaign_plan(state: &Arc<DaemonState>, params: &Value) -> Result {
    let target_actions = required_u32(params, "target_actions")?;
    let credits_allocated = required_i64(params, "credits_allocated")?;
    let plan = plan_tasks(credits_allocated, target_actions, &state.config.plan_limits())?;
    Ok(json!({
        "minimum_budget": minimum_budget(target_actions),
        "plan": to_json(&plan)?,
    }))
}
