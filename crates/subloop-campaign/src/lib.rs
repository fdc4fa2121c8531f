//! # subloop-campaign
//!
//! Video catalog and promotion campaigns.
//!
//! A campaign converts a credit budget into a fixed, deterministic set of
//! watch/like/subscribe tasks on one video. The budget is debited from the
//! owner when the campaign is created, paid out to task completers one
//! action at a time, and whatever is left is refunded when the campaign
//! completes or is cancelled.
//!
//! ## Modules
//!
//! - [`youtube`]: URL and duration parsing
//! - [`catalog`]: Video catalog
//! - [`plan`]: Budget to task allocation
//! - [`lifecycle`]: Creation, status transitions, completions
//! - [`analytics`]: Per-campaign reporting

pub mod analytics;
pub mod catalog;
pub mod lifecycle;
pub mod plan;
pub mod youtube;

pub use lifecycle::{
    create_campaign, record_completion, update_status, CampaignCreated, CompletionRecord,
    CreateCampaign, StatusChange,
};
pub use plan::{plan_tasks, CampaignPlan, PlanLimits};

use subloop_db::DbError;
use subloop_ledger::LedgerError;
use subloop_types::CampaignStatus;

/// Error types for campaign operations.
#[derive(Debug, thiserror::Error)]
pub enum CampaignError {
    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The URL does not contain a YouTube video id.
    #[error("invalid YouTube URL: {0}")]
    InvalidUrl(String),

    #[error("invalid title: {0}")]
    InvalidTitle(String),

    #[error("invalid description: {0}")]
    InvalidDescription(String),

    #[error("target actions must be between 1 and {max}, got {target}")]
    InvalidTarget { target: u32, max: u32 },

    #[error("credits allocated must be between 1 and {max}, got {credits}")]
    InvalidBudget { credits: i64, max: i64 },

    /// The plan or a payout needs more credits than the campaign holds.
    #[error("budget exceeded: required {required}, allocated {allocated}")]
    BudgetExceeded { required: i64, allocated: i64 },

    #[error("campaign has already reached its target of {target} actions")]
    TargetReached { target: u32 },

    #[error("campaign is {0}, not active")]
    Inactive(CampaignStatus),

    #[error("cannot move campaign from {from} to {to}")]
    InvalidTransition {
        from: CampaignStatus,
        to: CampaignStatus,
    },

    /// Only the owner (or an admin) may manage a campaign.
    #[error("not the campaign owner")]
    NotOwner,
}

impl From<rusqlite::Error> for CampaignError {
    fn from(e: rusqlite::Error) -> Self {
        CampaignError::Db(DbError::Sqlite(e))
    }
}

/// Convenience result type for campaign operations.
pub type Result<T> = std::result::Result<T, CampaignError>;
