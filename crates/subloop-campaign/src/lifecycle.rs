//! Campaign creation, status transitions and per-action payouts.

use rusqlite::Connection;
use serde::Serialize;
use subloop_db::queries::campaigns::{self, CampaignRow, NewCampaign};
use subloop_db::queries::tasks::{self, NewTask};
use subloop_db::queries::videos::VideoRow;
use subloop_ledger::add_credits;
use subloop_types::{CampaignStatus, TransactionType};

use crate::catalog::{register_video, VideoInput};
use crate::plan::{plan_tasks, CampaignPlan, PlanLimits};
use crate::{CampaignError, Result};

/// Maximum campaign title length, in characters.
pub const MAX_TITLE_CHARS: usize = 200;

/// Maximum campaign description length, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 2_000;

/// A request to promote a video.
#[derive(Debug, Clone)]
pub struct CreateCampaign {
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub video: VideoInput,
    pub credits_allocated: i64,
    pub target_actions: u32,
}

/// What [`create_campaign`] produced.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignCreated {
    pub campaign: CampaignRow,
    pub video: VideoRow,
    pub tasks_created: u32,
    pub plan: CampaignPlan,
    /// Owner balance after the budget was debited.
    pub owner_balance: i64,
}

/// What [`update_status`] changed.
#[derive(Debug, Clone, Serialize)]
pub struct StatusChange {
    pub campaign: CampaignRow,
    pub previous: CampaignStatus,
    pub tasks_failed: usize,
    pub refunded: i64,
}

/// What [`record_completion`] changed.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRecord {
    pub campaign: CampaignRow,
    /// The campaign reached its target with this action.
    pub completed: bool,
    pub refunded: i64,
}

fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    let len = title.chars().count();
    if len == 0 {
        return Err(CampaignError::InvalidTitle("title is required".into()));
    }
    if len > MAX_TITLE_CHARS {
        return Err(CampaignError::InvalidTitle(format!(
            "title must be at most {MAX_TITLE_CHARS} characters"
        )));
    }
    Ok(title.to_string())
}

fn validate_description(description: Option<&str>) -> Result<Option<String>> {
    let Some(description) = description.map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(None);
    };
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(CampaignError::InvalidDescription(format!(
            "description must be at most {MAX_DESCRIPTION_CHARS} characters"
        )));
    }
    Ok(Some(description.to_string()))
}

/// Create a campaign and its tasks in one transaction.
///
/// The owner is debited `credits_allocated` up front; nothing is written if
/// any step fails.
pub fn create_campaign(
    conn: &mut Connection,
    req: &CreateCampaign,
    limits: &PlanLimits,
    now: u64,
) -> Result<CampaignCreated> {
    let title = validate_title(&req.title)?;
    let description = validate_description(req.description.as_deref())?;
    let plan = plan_tasks(req.credits_allocated, req.target_actions, limits)?;

    let tx = conn.transaction()?;

    let video = register_video(&tx, &req.video, now)?;
    let campaign_id = uuid::Uuid::new_v4().to_string();

    let owner_balance = add_credits(
        &tx,
        &req.owner_id,
        -req.credits_allocated,
        TransactionType::CampaignBudget,
        Some(&format!("Campaign budget: {title}")),
        Some(&campaign_id),
        now,
    )?;

    campaigns::insert(
        &tx,
        &NewCampaign {
            id: &campaign_id,
            user_id: &req.owner_id,
            video_id: &video.id,
            title: &title,
            description: description.as_deref(),
            target_actions: req.target_actions,
            credits_allocated: req.credits_allocated,
        },
        now,
    )?;

    for planned in &plan.tasks {
        let task_id = uuid::Uuid::new_v4().to_string();
        tasks::insert(
            &tx,
            &NewTask {
                id: &task_id,
                campaign_id: &campaign_id,
                video_id: &video.id,
                task_type: planned.task_type,
                credits_reward: planned.credits_reward,
                created_by: &req.owner_id,
            },
            now,
        )?;
    }

    let campaign = campaigns::get(&tx, &campaign_id)?;
    tx.commit()?;

    tracing::info!(
        campaign_id = %campaign.id,
        owner = %req.owner_id,
        credits = req.credits_allocated,
        tasks = plan.tasks.len(),
        "campaign created"
    );

    Ok(CampaignCreated {
        tasks_created: plan.tasks.len() as u32,
        campaign,
        video,
        plan,
        owner_balance,
    })
}

/// Refund whatever part of the budget has not been paid out.
fn refund_remaining(conn: &Connection, campaign: &CampaignRow, now: u64) -> Result<i64> {
    let remaining = campaign.remaining_credits();
    if remaining <= 0 {
        return Ok(0);
    }
    add_credits(
        conn,
        &campaign.user_id,
        remaining,
        TransactionType::CampaignRefund,
        Some(&format!("Unspent budget: {}", campaign.title)),
        Some(&campaign.id),
        now,
    )?;
    Ok(remaining)
}

/// Move a campaign to `next`.
///
/// Only the owner may do this unless `is_admin`. Cancelling fails every
/// open task and refunds the unspent budget.
pub fn update_status(
    conn: &mut Connection,
    campaign_id: &str,
    actor_id: &str,
    is_admin: bool,
    next: CampaignStatus,
    now: u64,
) -> Result<StatusChange> {
    let tx = conn.transaction()?;
    let campaign = campaigns::get(&tx, campaign_id)?;
    if campaign.user_id != actor_id && !is_admin {
        return Err(CampaignError::NotOwner);
    }

    let previous = campaign.status;
    if !previous.can_transition_to(next, campaign.is_fully_delivered()) {
        return Err(CampaignError::InvalidTransition {
            from: previous,
            to: next,
        });
    }

    campaigns::set_status(&tx, campaign_id, next, now)?;

    let mut tasks_failed = 0;
    let mut refunded = 0;
    if next.is_terminal() {
        tasks_failed = tasks::fail_open_for_campaign(&tx, campaign_id, now)?;
        refunded = refund_remaining(&tx, &campaign, now)?;
    }

    let campaign = campaigns::get(&tx, campaign_id)?;
    tx.commit()?;

    tracing::info!(
        campaign_id,
        from = %previous,
        to = %next,
        tasks_failed,
        refunded,
        "campaign status changed"
    );

    Ok(StatusChange {
        campaign,
        previous,
        tasks_failed,
        refunded,
    })
}

/// Count one delivered action and pay for it out of the budget.
///
/// Must run inside the caller's transaction. When the last target action
/// lands, the campaign becomes `completed` and any surplus is refunded.
pub fn record_completion(
    conn: &Connection,
    campaign_id: &str,
    reward: i64,
    now: u64,
) -> Result<CompletionRecord> {
    let campaign = campaigns::get(conn, campaign_id)?;
    if campaign.status != CampaignStatus::Active {
        return Err(CampaignError::Inactive(campaign.status));
    }
    if campaign.is_fully_delivered() {
        return Err(CampaignError::TargetReached {
            target: campaign.target_actions,
        });
    }
    let required = campaign.credits_spent + reward;
    if required > campaign.credits_allocated {
        return Err(CampaignError::BudgetExceeded {
            required,
            allocated: campaign.credits_allocated,
        });
    }

    campaigns::add_completion(conn, campaign_id, reward, now)?;
    let mut campaign = campaigns::get(conn, campaign_id)?;

    let mut refunded = 0;
    let completed = campaign.is_fully_delivered();
    if completed {
        campaigns::set_status(conn, campaign_id, CampaignStatus::Completed, now)?;
        refunded = refund_remaining(conn, &campaign, now)?;
        campaign = campaigns::get(conn, campaign_id)?;
        tracing::info!(campaign_id, refunded, "campaign completed");
    }

    Ok(CompletionRecord {
        campaign,
        completed,
        refunded,
    })
}

/// Campaigns owned by a user, newest first.
pub fn user_campaigns(conn: &Connection, user_id: &str) -> Result<Vec<CampaignRow>> {
    Ok(campaigns::list_by_user(conn, user_id)?)
}

/// Active campaigns, newest first.
pub fn active_campaigns(conn: &Connection, limit: u32) -> Result<Vec<CampaignRow>> {
    Ok(campaigns::list_active(conn, limit.clamp(1, 100))?)
}
