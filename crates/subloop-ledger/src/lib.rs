//! # subloop-ledger
//!
//! The credit ledger. Every change to a profile's balance goes through
//! [`credits::add_credits`], which updates `profiles.credits` and appends a
//! `credit_transactions` row in the same statement sequence, so a profile's
//! balance always equals the signed sum of its ledger rows.
//!
//! ## Modules
//!
//! - [`credits`]: Balance mutation and conservation audit
//! - [`stats`]: Earnings statistics, charts and history

pub mod credits;
pub mod stats;

pub use credits::{add_credits, add_credits_atomic, audit_all, audit_user, spend_credits, Audit};
pub use stats::{credit_stats, earnings_chart, history, CreditStats};

use subloop_db::DbError;

/// Error types for ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("database error: {0}")]
    Db(#[from] DbError),

    /// A zero-credit movement was requested.
    #[error("credit amount is zero")]
    ZeroAmount,

    /// The debit would take the balance below zero.
    #[error("insufficient credits: required {required}, available {available}")]
    InsufficientCredits {
        /// Credits the operation needs.
        required: i64,
        /// Credits the user holds.
        available: i64,
    },

    /// Arithmetic overflow.
    #[error("arithmetic overflow in credit calculation")]
    Overflow,
}

impl From<rusqlite::Error> for LedgerError {
    fn from(e: rusqlite::Error) -> Self {
        LedgerError::Db(DbError::Sqlite(e))
    }
}

/// Convenience result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
