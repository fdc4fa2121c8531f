//! # subloop-referral
//!
//! Referral codes and referral bonuses.
//!
//! Every profile carries an 8-character code. A new user who signs up with
//! someone else's code is linked to that referrer once, and both sides are
//! paid a `referral_bonus` through the ledger.
//!
//! ## Modules
//!
//! - [`codes`]: Code generation, assignment and validation
//! - [`program`]: Referral processing and statistics

pub mod codes;
pub mod program;

pub use codes::{assign_code, generate_code, validate_code, CodeValidation};
pub use program::{events, process_referral, stats, ReferralOutcome, ReferralStats};

use subloop_db::DbError;
use subloop_ledger::LedgerError;

/// Credits paid to the referrer.
pub const REFERRER_BONUS: i64 = 100;

/// Credits paid to the new user.
pub const REFEREE_BONUS: i64 = 50;

/// Error types for referral operations.
#[derive(Debug, thiserror::Error)]
pub enum ReferralError {
    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("invalid referral code")]
    InvalidCode,

    #[error("cannot refer yourself")]
    SelfReferral,

    #[error("user already has a referrer")]
    AlreadyReferred,

    /// Every generated code collided with an existing one.
    #[error("could not generate a unique referral code after {0} attempts")]
    CodeGenerationFailed(u32),
}

impl From<rusqlite::Error> for ReferralError {
    fn from(e: rusqlite::Error) -> Self {
        ReferralError::Db(DbError::Sqlite(e))
    }
}

/// Convenience result type for referral operations.
pub type Result<T> = std::result::Result<T, ReferralError>;
