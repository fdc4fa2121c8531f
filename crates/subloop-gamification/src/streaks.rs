//! Daily streaks and the once-per-day reward.
//!
//! Days are UTC day numbers. A streak advances by one when the previous
//! check-in was the day before, restarts at one after a gap, and is left
//! alone on a second check-in the same day.

use rusqlite::Connection;
use serde::Serialize;
use subloop_db::queries::profiles;
use subloop_ledger::add_credits;
use subloop_types::{day_of, TransactionType};

use crate::Result;

/// Credits paid on every 7th consecutive day.
pub const WEEKLY_STREAK_BONUS: i64 = 25;

/// Base daily reward before the streak bonus.
pub const DAILY_BASE_REWARD: i64 = 10;

/// Cap on the streak part of the daily reward.
pub const DAILY_STREAK_BONUS_CAP: i64 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreakUpdate {
    pub streak_count: u32,
    /// A previous streak existed and was reset.
    pub streak_broken: bool,
    pub bonus_awarded: bool,
    /// The user had already checked in today; nothing changed.
    pub already_counted: bool,
}

/// Register a check-in for `now`.
pub fn update_streak(conn: &Connection, user_id: &str, now: u64) -> Result<StreakUpdate> {
    let profile = profiles::get(conn, user_id)?;
    let today = day_of(now);

    if profile.last_login_day == Some(today) {
        return Ok(StreakUpdate {
            streak_count: profile.streak_count,
            streak_broken: false,
            bonus_awarded: false,
            already_counted: true,
        });
    }

    let (streak_count, streak_broken) = match profile.last_login_day {
        Some(last) if last + 1 == today => (profile.streak_count.saturating_add(1), false),
        Some(_) => (1, true),
        None => (1, false),
    };

    profiles::set_streak(conn, user_id, streak_count, today, now)?;

    let bonus_awarded = streak_count % 7 == 0;
    if bonus_awarded {
        add_credits(
            conn,
            user_id,
            WEEKLY_STREAK_BONUS,
            TransactionType::StreakBonus,
            Some(&format!("Weekly streak bonus ({streak_count} days)")),
            None,
            now,
        )?;
        tracing::info!(user_id, streak_count, "weekly streak bonus paid");
    }

    Ok(StreakUpdate {
        streak_count,
        streak_broken,
        bonus_awarded,
        already_counted: false,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyReward {
    pub claimed: bool,
    pub reward: i64,
    pub base_reward: i64,
    pub streak_bonus: i64,
    pub streak_count: u32,
    /// Set when nothing was claimed.
    pub reason: Option<String>,
}

/// Daily reward for a streak length.
pub fn daily_reward_for(streak_count: u32) -> (i64, i64) {
    let streak_bonus = (i64::from(streak_count) * 2).min(DAILY_STREAK_BONUS_CAP);
    (DAILY_BASE_REWARD, streak_bonus)
}

/// Pay the daily reward, at most once per UTC day.
pub fn claim_daily_reward(conn: &Connection, user_id: &str, now: u64) -> Result<DailyReward> {
    let profile = profiles::get(conn, user_id)?;
    let today = day_of(now);
    let (base_reward, streak_bonus) = daily_reward_for(profile.streak_count);

    if profile.last_reward_day == Some(today) {
        return Ok(DailyReward {
            claimed: false,
            reward: 0,
            base_reward,
            streak_bonus,
            streak_count: profile.streak_count,
            reason: Some("Already claimed today".into()),
        });
    }

    let reward = base_reward + streak_bonus;
    add_credits(
        conn,
        user_id,
        reward,
        TransactionType::DailyReward,
        Some(&format!("Daily login reward ({reward} credits)")),
        None,
        now,
    )?;
    profiles::set_last_reward_day(conn, user_id, today, now)?;

    Ok(DailyReward {
        claimed: true,
        reward,
        base_reward,
        streak_bonus,
        streak_count: profile.streak_count,
        reason: None,
    })
}
