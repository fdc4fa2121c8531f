//! # subloop-moderation
//!
//! Trust and safety: spam scoring, content reports, the moderation queue,
//! bans and ban appeals.
//!
//! ## Modules
//!
//! - [`spam`]: Heuristic spam scoring
//! - [`reports`]: User reports against content
//! - [`queue`]: Moderation queue and auto-flagging
//! - [`bans`]: Bans, ban checks and appeals

pub mod bans;
pub mod queue;
pub mod reports;
pub mod spam;

pub use bans::{
    active_ban, all_bans, ban_user, is_banned, process_appeal, submit_appeal, unban, user_bans,
    BanRequest,
};
pub use queue::{auto_flag, moderate_content, moderation_queue};
pub use reports::{all_reports, create_report, review_report, user_reports, NewReport};
pub use spam::{check_spam, SpamCheck};

use subloop_db::DbError;
use subloop_types::AppealStatus;

/// Error types for moderation operations.
#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    #[error("database error: {0}")]
    Db(#[from] DbError),

    /// A free-text field is empty or too long.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },

    #[error("cannot ban yourself")]
    SelfBan,

    #[error("temporary bans need an expiry in the future")]
    InvalidExpiry,

    #[error("only the banned user may appeal this ban")]
    NotBanHolder,

    #[error("an appeal is already {0}")]
    AppealExists(AppealStatus),

    #[error("ban has no pending appeal")]
    NoPendingAppeal,

    /// A review decision outside the allowed set was supplied.
    #[error("invalid decision: {0}")]
    InvalidDecision(String),
}

/// Convenience result type for moderation operations.
pub type Result<T> = std::result::Result<T, ModerationError>;

/// Validate a free-text field: trimmed, non-empty when `required`, at most
/// `max` characters.
pub(crate) fn clean_text(
    field: &'static str,
    value: Option<&str>,
    max: usize,
    required: bool,
) -> Result<Option<String>> {
    let value = value.map(str::trim).filter(|v| !v.is_empty());
    match value {
        None if required => Err(ModerationError::InvalidField {
            field,
            reason: "is required".into(),
        }),
        None => Ok(None),
        Some(v) if v.chars().count() > max => Err(ModerationError::InvalidField {
            field,
            reason: format!("must be at most {max} characters"),
        }),
        Some(v) => Ok(Some(v.to_string())),
    }
}
