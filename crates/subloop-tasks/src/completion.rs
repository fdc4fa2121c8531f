//! Atomic task completion.
//!
//! Checks run in a fixed order and the first failure wins. Every write
//! happens inside one transaction; on any error nothing is persisted except
//! the fraud log entry for an attempt blocked as suspicious.

use rusqlite::Connection;
use serde::Serialize;
use subloop_campaign::record_completion;
use subloop_db::queries::{campaigns, profiles, tasks, videos};
use subloop_db::DbError;
use subloop_fraud::{detect_patterns, log_event, rate_limit_check, LogEvent, TASK_COMPLETE_EVENT};
use subloop_gamification::{
    award_xp, check_achievements, update_streak, Achievement, StreakUpdate, XpAward,
};
use subloop_ledger::add_credits;
use subloop_moderation::active_ban;
use subloop_types::{CampaignStatus, RiskLevel, TaskStatus, TaskType, TransactionType};

use crate::verify::{TaskContext, TaskVerifier};
use crate::{Result, TaskError};

/// Event logged when a completion is refused as suspicious.
pub const BLOCKED_COMPLETION_EVENT: &str = "task_complete_blocked";

/// Tunables for [`complete_task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionPolicy {
    /// Refuse completions while the account's fraud risk is high.
    pub block_on_high_risk: bool,
    /// Completions allowed per window.
    pub task_rate_limit: u32,
    pub task_rate_window_minutes: u32,
}

impl Default for CompletionPolicy {
    fn default() -> Self {
        Self {
            block_on_high_risk: true,
            task_rate_limit: 30,
            task_rate_window_minutes: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub user_id: &'a str,
    pub task_id: &'a str,
    pub ip_address: &'a str,
    pub device_fingerprint: &'a str,
}

/// Everything a successful completion changed.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionOutcome {
    pub task_id: String,
    pub campaign_id: String,
    pub task_type: TaskType,
    pub credits_awarded: i64,
    pub new_balance: i64,
    pub xp: XpAward,
    pub streak: StreakUpdate,
    pub achievements: Vec<&'static Achievement>,
    /// This completion delivered the campaign's last action.
    pub campaign_completed: bool,
    pub campaign_refunded: i64,
}

/// Complete a task for a user.
pub fn complete_task(
    conn: &mut Connection,
    verifier: &dyn TaskVerifier,
    req: &CompletionRequest<'_>,
    policy: &CompletionPolicy,
    now: u64,
) -> Result<CompletionOutcome> {
    let result = complete_in_transaction(conn, verifier, req, policy, now);

    if let Err(TaskError::FraudSuspected { risk_score }) = &result {
        let logged = log_event(
            conn,
            LogEvent {
                user_id: req.user_id,
                ip_address: req.ip_address,
                device_fingerprint: req.device_fingerprint,
                event_type: BLOCKED_COMPLETION_EVENT,
                details: serde_json::json!({
                    "task_id": req.task_id,
                    "risk_score": risk_score,
                }),
            },
            now,
        );
        if let Err(e) = logged {
            tracing::warn!(user_id = req.user_id, error = %e, "failed to log blocked completion");
        }
    }

    result
}

fn complete_in_transaction(
    conn: &mut Connection,
    verifier: &dyn TaskVerifier,
    req: &CompletionRequest<'_>,
    policy: &CompletionPolicy,
    now: u64,
) -> Result<CompletionOutcome> {
    let tx = conn.transaction()?;
    let user_id = req.user_id;

    // 1. Account
    profiles::get(&tx, user_id)?;
    if let Some(ban) = active_ban(&tx, user_id, now)? {
        return Err(TaskError::Banned {
            ban_id: ban.id,
            expires_at: ban.expires_at,
        });
    }

    // 2. Task state
    let task = tasks::get(&tx, req.task_id)?;
    match task.status {
        TaskStatus::Pending => {}
        TaskStatus::InProgress => {
            // Reserved tasks belong to whoever reserved them.
            if tasks::reservation_holder(&tx, &task.id)?.is_some_and(|holder| holder != user_id) {
                return Err(TaskError::TaskUnavailable(TaskStatus::InProgress));
            }
        }
        TaskStatus::Completed => return Err(TaskError::TaskAlreadyCompleted),
        other => return Err(TaskError::TaskUnavailable(other)),
    }

    // 3. Own campaign
    if task.created_by == user_id {
        return Err(TaskError::SelfDealing);
    }

    // 4. Once per user
    if tasks::get_assignment(&tx, user_id, &task.id)?
        .is_some_and(|ut| ut.status == TaskStatus::Completed)
    {
        return Err(TaskError::AlreadyCompletedByUser);
    }

    // 5. Once per action on a video
    if tasks::has_completed_action(&tx, user_id, &task.video_id, task.task_type)? {
        return Err(TaskError::DuplicateAction);
    }

    // 6. Campaign
    let campaign = campaigns::get(&tx, &task.campaign_id)?;
    if campaign.status != CampaignStatus::Active {
        return Err(TaskError::CampaignInactive(campaign.status));
    }

    // 7. Rate limit
    let rate = rate_limit_check(
        &tx,
        user_id,
        TASK_COMPLETE_EVENT,
        Some(policy.task_rate_limit),
        Some(policy.task_rate_window_minutes),
        now,
    )?;
    if !rate.is_allowed {
        return Err(TaskError::RateLimited {
            count: rate.count,
            limit: rate.limit,
        });
    }

    // 8. Fraud patterns
    let patterns = detect_patterns(&tx, user_id, now)?;
    if patterns.risk_level == RiskLevel::High {
        if policy.block_on_high_risk {
            tracing::warn!(
                user_id,
                task_id = %task.id,
                risk_score = patterns.risk_score,
                "completion blocked as suspicious"
            );
            return Err(TaskError::FraudSuspected {
                risk_score: patterns.risk_score,
            });
        }
        tracing::warn!(user_id, risk_score = patterns.risk_score, "high-risk completion allowed");
    }

    // 9. Verification
    let video = match videos::get(&tx, &task.video_id) {
        Ok(v) => Some(v),
        Err(DbError::NotFound(_)) => None,
        Err(e) => return Err(e.into()),
    };
    let ctx = TaskContext {
        user_id: user_id.to_string(),
        task: task.clone(),
        video,
        ip_address: req.ip_address.to_string(),
        device_fingerprint: req.device_fingerprint.to_string(),
    };
    if !verifier.verify(&ctx)? {
        return Err(TaskError::VerificationFailed);
    }

    // 10. Task and assignment
    let reward = task.credits_reward;
    tasks::set_status(&tx, &task.id, TaskStatus::Completed, now)?;
    tasks::complete_assignment(
        &tx,
        &uuid::Uuid::new_v4().to_string(),
        user_id,
        &task.id,
        reward,
        now,
    )?;
    tasks::fail_other_assignments(&tx, &task.id, user_id)?;

    // 11. Campaign budget
    let record = record_completion(&tx, &task.campaign_id, reward, now)?;

    // 12. Ledger
    add_credits(
        &tx,
        user_id,
        reward,
        TransactionType::TaskReward,
        Some(&format!("Completed {} task", task.task_type)),
        Some(&task.id),
        now,
    )?;

    // 13. Progression
    let xp = award_xp(&tx, user_id, task.task_type, now)?;
    let streak = update_streak(&tx, user_id, now)?;

    // 14. Fraud log
    log_event(
        &tx,
        LogEvent {
            user_id,
            ip_address: req.ip_address,
            device_fingerprint: req.device_fingerprint,
            event_type: TASK_COMPLETE_EVENT,
            details: serde_json::json!({
                "task_id": task.id,
                "campaign_id": task.campaign_id,
                "task_type": task.task_type,
                "credits": reward,
            }),
        },
        now,
    )?;

    // 15. Achievements
    let achievements = check_achievements(&tx, user_id, now)?;

    let new_balance = profiles::credits(&tx, user_id)?;
    tx.commit()?;

    tracing::info!(
        user_id,
        task_id = %task.id,
        task_type = %task.task_type,
        reward,
        campaign_completed = record.completed,
        "task completed"
    );

    Ok(CompletionOutcome {
        task_id: task.id,
        campaign_id: task.campaign_id,
        task_type: task.task_type,
        credits_awarded: reward,
        new_balance,
        xp,
        streak,
        achievements,
        campaign_completed: record.completed,
        campaign_refunded: record.refunded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup;
    use crate::verify::CatalogVerifier;
    use subloop_campaign::catalog::VideoInput;
    use subloop_campaign::{create_campaign, update_status, CreateCampaign, PlanLimits};
    use subloop_db::queries::fraud;
    use subloop_ledger::audit_all;
    use subloop_moderation::{ban_user, BanRequest};
    use subloop_types::BanType;

    fn request<'a>(user: &'a str, task: &'a str) -> CompletionRequest<'a> {
        CompletionRequest {
            user_id: user,
            task_id: task,
            ip_address: "10.0.0.1",
            device_fingerprint: "device-1",
        }
    }

    fn task_of(conn: &Connection, campaign_id: &str, tt: TaskType) -> String {
        tasks::list_for_campaign(conn, campaign_id)
            .expect("tasks")
            .into_iter()
            .find(|t| t.task_type == tt)
            .expect("task of type")
            .id
    }

    fn complete(
        conn: &mut Connection,
        user: &str,
        task: &str,
        policy: &CompletionPolicy,
        now: u64,
    ) -> Result<CompletionOutcome> {
        complete_task(conn, &CatalogVerifier, &request(user, task), policy, now)
    }

    struct Rejecting;

    impl TaskVerifier for Rejecting {
        fn verify(&self, _ctx: &TaskContext) -> Result<bool> {
            Ok(false)
        }
    }

    #[test]
    fn test_full_campaign_delivery() {
        let (mut conn, created) = setup(20, 3);
        let cid = created.campaign.id.clone();
        let policy = CompletionPolicy::default();

        let watch = task_of(&conn, &cid, TaskType::Watch);
        let out = complete(&mut conn, "worker", &watch, &policy, 1_000).expect("watch");
        assert_eq!(out.credits_awarded, 1);
        assert_eq!(out.xp.xp_awarded, 10);
        assert_eq!(out.streak.streak_count, 1);
        assert_eq!(out.achievements.len(), 1);
        assert_eq!(out.achievements[0].id, "first_task");
        // Reward plus the first_task bonus.
        assert_eq!(out.new_balance, 51);
        assert!(!out.campaign_completed);

        let like = task_of(&conn, &cid, TaskType::Like);
        complete(&mut conn, "worker", &like, &policy, 1_100).expect("like");
        let sub = task_of(&conn, &cid, TaskType::Subscribe);
        let last = complete(&mut conn, "worker", &sub, &policy, 1_200).expect("subscribe");
        assert!(last.campaign_completed);
        assert_eq!(last.campaign_refunded, 12);
        assert_eq!(last.new_balance, 58);

        let campaign = campaigns::get(&conn, &cid).expect("campaign");
        assert_eq!(campaign.status, CampaignStatus::Completed);
        assert_eq!(campaign.credits_spent, 8);
        assert_eq!(profiles::credits(&conn, "owner").expect("owner"), 992);
        assert!(audit_all(&conn).expect("audit").is_empty());
        assert_eq!(
            fraud::count_since(&conn, "worker", Some(TASK_COMPLETE_EVENT), 0).expect("logs"),
            3
        );
    }

    #[test]
    fn test_second_completion_rejected() {
        let (mut conn, created) = setup(20, 3);
        let watch = task_of(&conn, &created.campaign.id, TaskType::Watch);
        let policy = CompletionPolicy::default();
        complete(&mut conn, "worker", &watch, &policy, 1_000).expect("first");

        let err = complete(&mut conn, "worker", &watch, &policy, 1_010).expect_err("again");
        assert!(matches!(err, TaskError::TaskAlreadyCompleted));
        let err = complete(&mut conn, "worker2", &watch, &policy, 1_010).expect_err("someone else");
        assert!(matches!(err, TaskError::TaskAlreadyCompleted));
    }

    #[test]
    fn test_reserved_task_belongs_to_holder() {
        let (mut conn, created) = setup(20, 3);
        let watch = task_of(&conn, &created.campaign.id, TaskType::Watch);
        let policy = CompletionPolicy::default();
        crate::assign_task(&conn, "worker", &watch, 900).expect("reserve");

        let err = complete(&mut conn, "worker2", &watch, &policy, 1_000).expect_err("taken");
        assert!(matches!(err, TaskError::TaskUnavailable(TaskStatus::InProgress)));
        assert_eq!(profiles::credits(&conn, "worker2").expect("credits"), 0);

        complete(&mut conn, "worker", &watch, &policy, 1_010).expect("holder completes");
        let stats = crate::task_stats(&conn, "worker").expect("stats");
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.in_progress, 0);
    }

    #[test]
    fn test_completion_fails_stale_assignments() {
        let (mut conn, created) = setup(20, 3);
        let like = task_of(&conn, &created.campaign.id, TaskType::Like);
        let policy = CompletionPolicy::default();
        // An open row left behind without a reservation on the task.
        tasks::insert_assignment(&conn, "stale", "worker2", &like, 900).expect("row");

        complete(&mut conn, "worker", &like, &policy, 1_000).expect("complete");
        let stale = tasks::get_assignment(&conn, "worker2", &like)
            .expect("get")
            .expect("exists");
        assert_eq!(stale.status, TaskStatus::Failed);
        assert_eq!(crate::task_stats(&conn, "worker2").expect("stats").in_progress, 0);
    }

    #[test]
    fn test_self_dealing_and_ban() {
        let (mut conn, created) = setup(20, 3);
        let watch = task_of(&conn, &created.campaign.id, TaskType::Watch);
        let policy = CompletionPolicy::default();

        let err = complete(&mut conn, "owner", &watch, &policy, 1_000).expect_err("own task");
        assert!(matches!(err, TaskError::SelfDealing));

        ban_user(
            &conn,
            &BanRequest {
                user_id: "worker",
                banned_by: "owner",
                reason: "bots",
                ban_type: BanType::Permanent,
                expires_at: None,
            },
            500,
        )
        .expect("ban");
        let err = complete(&mut conn, "worker", &watch, &policy, 1_000).expect_err("banned");
        assert!(matches!(err, TaskError::Banned { expires_at: None, .. }));
    }

    #[test]
    fn test_duplicate_action_across_campaigns() {
        let (mut conn, created) = setup(20, 3);
        let second = create_campaign(
            &mut conn,
            &CreateCampaign {
                owner_id: "owner".into(),
                title: "Again".into(),
                description: None,
                video: VideoInput {
                    url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".into(),
                    ..Default::default()
                },
                credits_allocated: 10,
                target_actions: 3,
            },
            &PlanLimits::default(),
            200,
        )
        .expect("second campaign");
        assert_eq!(second.video.id, created.video.id);

        let policy = CompletionPolicy::default();
        let first = task_of(&conn, &created.campaign.id, TaskType::Watch);
        complete(&mut conn, "worker", &first, &policy, 1_000).expect("first");
        let other = task_of(&conn, &second.campaign.id, TaskType::Watch);
        let err = complete(&mut conn, "worker", &other, &policy, 1_100).expect_err("same action");
        assert!(matches!(err, TaskError::DuplicateAction));
    }

    #[test]
    fn test_paused_campaign() {
        let (mut conn, created) = setup(20, 3);
        let cid = created.campaign.id.clone();
        update_status(&mut conn, &cid, "owner", false, CampaignStatus::Paused, 300)
            .expect("pause");
        let watch = task_of(&conn, &cid, TaskType::Watch);
        let err = complete_task(
            &mut conn,
            &CatalogVerifier,
            &request("worker", &watch),
            &CompletionPolicy::default(),
            1_000,
        )
        .expect_err("paused");
        assert!(matches!(err, TaskError::CampaignInactive(CampaignStatus::Paused)));
    }

    #[test]
    fn test_rate_limit() {
        let (mut conn, created) = setup(20, 3);
        let cid = created.campaign.id.clone();
        let policy = CompletionPolicy {
            task_rate_limit: 1,
            ..Default::default()
        };
        let watch = task_of(&conn, &cid, TaskType::Watch);
        complete(&mut conn, "worker", &watch, &policy, 1_000).expect("first");
        let like = task_of(&conn, &cid, TaskType::Like);
        let err = complete(&mut conn, "worker", &like, &policy, 1_060).expect_err("limited");
        assert!(matches!(err, TaskError::RateLimited { count: 1, limit: 1 }));
    }

    #[test]
    fn test_verification_failure_rolls_back() {
        let (mut conn, created) = setup(20, 3);
        let watch = task_of(&conn, &created.campaign.id, TaskType::Watch);
        let err = complete_task(
            &mut conn,
            &Rejecting,
            &request("worker", &watch),
            &CompletionPolicy::default(),
            1_000,
        )
        .expect_err("rejected");
        assert!(matches!(err, TaskError::VerificationFailed));

        assert_eq!(profiles::credits(&conn, "worker").expect("credits"), 0);
        assert_eq!(tasks::get(&conn, &watch).expect("task").status, TaskStatus::Pending);
        assert_eq!(
            campaigns::get(&conn, &created.campaign.id)
                .expect("campaign")
                .completed_actions,
            0
        );
    }

    #[test]
    fn test_high_risk_blocked_and_logged() {
        let (mut conn, created) = setup(20, 3);
        let cid = created.campaign.id.clone();
        let now = 10_000;
        // 31 completions one second apart: fast pace and a bot-like interval.
        for i in 0..31u64 {
            let id = format!("seed{i}");
            tasks::insert(
                &conn,
                &tasks::NewTask {
                    id: &id,
                    campaign_id: &cid,
                    video_id: &created.video.id,
                    task_type: TaskType::Watch,
                    credits_reward: 1,
                    created_by: "owner",
                },
                100,
            )
            .expect("seed task");
            tasks::complete_assignment(&conn, &format!("ut-{id}"), "worker2", &id, 1, now - 100 + i)
                .expect("seed completion");
        }

        let like = task_of(&conn, &cid, TaskType::Like);
        let err = complete_task(
            &mut conn,
            &CatalogVerifier,
            &request("worker2", &like),
            &CompletionPolicy::default(),
            now,
        )
        .expect_err("blocked");
        assert!(matches!(err, TaskError::FraudSuspected { risk_score: 60 }));
        assert_eq!(
            fraud::count_since(&conn, "worker2", Some(BLOCKED_COMPLETION_EVENT), 0).expect("logs"),
            1
        );
        assert_eq!(profiles::credits(&conn, "worker2").expect("credits"), 0);

        let lenient = CompletionPolicy {
            block_on_high_risk: false,
            ..Default::default()
        };
        complete(&mut conn, "worker2", &like, &lenient, now).expect("allowed");
    }
}
