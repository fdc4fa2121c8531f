//! # subloop-gamification
//!
//! Experience, levels, streaks, daily rewards, achievements and the
//! leaderboard.
//!
//! XP lives only on the profile; it is never written to the credit ledger.
//! Streak bonuses, daily rewards and achievement bonuses are real credits
//! and go through [`subloop_ledger::add_credits`].
//!
//! ## Modules
//!
//! - [`levels`]: XP table and level progression
//! - [`streaks`]: Daily streaks and the daily reward
//! - [`achievements`]: Achievement catalog and unlocks
//! - [`leaderboard`]: Ranking by level and XP

pub mod achievements;
pub mod leaderboard;
pub mod levels;
pub mod streaks;

pub use achievements::{check_achievements, Achievement, ACHIEVEMENTS};
pub use leaderboard::{leaderboard, LeaderboardEntry};
pub use levels::{award_xp, level_for_xp, next_level_xp, progress, Progress, XpAward};
pub use streaks::{claim_daily_reward, update_streak, DailyReward, StreakUpdate};

use subloop_db::DbError;
use subloop_ledger::LedgerError;

/// Error types for gamification operations.
#[derive(Debug, thiserror::Error)]
pub enum GamificationError {
    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Convenience result type for gamification operations.
pub type Result<T> = std::result::Result<T, GamificationError>;
