//! # subloop-tasks
//!
//! Task discovery, assignment and completion.
//!
//! Completing a task is the one workflow that touches every other part of
//! the economy: eligibility and fraud checks, the campaign budget, the
//! ledger, XP, streaks and achievements. [`complete_task`] runs all of it
//! inside a single SQLite transaction, so a completion either lands in full
//! or not at all.
//!
//! ## Modules
//!
//! - [`discovery`]: Available tasks, assignments, per-user stats
//! - [`verify`]: The verification seam
//! - [`completion`]: Atomic task completion

pub mod completion;
pub mod discovery;
pub mod verify;

pub use completion::{complete_task, CompletionOutcome, CompletionPolicy, CompletionRequest};
pub use discovery::{assign_task, available_tasks, task_stats, user_tasks, TaskStats};
pub use verify::{CatalogVerifier, TaskContext, TaskVerifier};

use subloop_campaign::CampaignError;
use subloop_db::DbError;
use subloop_fraud::FraudError;
use subloop_gamification::GamificationError;
use subloop_ledger::LedgerError;
use subloop_moderation::ModerationError;
use subloop_types::{CampaignStatus, TaskStatus};

/// Error types for task operations.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Campaign(#[from] CampaignError),

    #[error(transparent)]
    Gamification(#[from] GamificationError),

    #[error(transparent)]
    Fraud(#[from] FraudError),

    #[error(transparent)]
    Moderation(#[from] ModerationError),

    /// The account has an active ban.
    #[error("account is banned")]
    Banned { ban_id: String, expires_at: Option<u64> },

    #[error("task has already been completed")]
    TaskAlreadyCompleted,

    #[error("task is {0} and cannot be taken")]
    TaskUnavailable(TaskStatus),

    /// Users may not work on their own campaigns.
    #[error("cannot complete your own task")]
    SelfDealing,

    #[error("you have already completed this task")]
    AlreadyCompletedByUser,

    /// The same action on the same video was already paid through another task.
    #[error("you have already performed this action on this video")]
    DuplicateAction,

    #[error("campaign is {0}")]
    CampaignInactive(CampaignStatus),

    #[error("rate limit exceeded: {count} completions, limit {limit}")]
    RateLimited { count: u64, limit: u32 },

    #[error("activity flagged as suspicious")]
    FraudSuspected { risk_score: u32 },

    #[error("task verification failed")]
    VerificationFailed,
}

impl From<rusqlite::Error> for TaskError {
    fn from(e: rusqlite::Error) -> Self {
        TaskError::Db(DbError::Sqlite(e))
    }
}

/// Convenience result type for task operations.
pub type Result<T> = std::result::Result<T, TaskError>;

#[cfg(test)]
pub(crate) mod test_support {
    use rusqlite::Connection;
    use subloop_campaign::catalog::VideoInput;
    use subloop_campaign::{create_campaign, CampaignCreated, CreateCampaign, PlanLimits};
    use subloop_db::queries::profiles;
    use subloop_types::TransactionType;

    /// Owner with 1000 credits, two workers, and one campaign of `target`
    /// actions funded with `credits`.
    pub fn setup(credits: i64, target: u32) -> (Connection, CampaignCreated) {
        let mut conn = subloop_db::open_memory().expect("open");
        for id in ["owner", "worker", "worker2"] {
            profiles::insert(&conn, id, id, None, 0).expect("profile");
        }
        subloop_ledger::add_credits(
            &conn,
            "owner",
            1_000,
            TransactionType::SignupBonus,
            None,
            None,
            0,
        )
        .expect("fund");
        let created = create_campaign(
            &mut conn,
            &CreateCampaign {
                owner_id: "owner".into(),
                title: "Launch".into(),
                description: None,
                video: VideoInput {
                    url: "https://youtu.be/dQw4w9WgXcQ".into(),
                    channel_id: Some("UC123".into()),
                    ..Default::default()
                },
                credits_allocated: credits,
                target_actions: target,
            },
            &PlanLimits::default(),
            100,
        )
        .expect("campaign");
        (conn, created)
    }
}
