//! Earnings statistics, charts and paged history.

use rusqlite::Connection;
use serde::Serialize;
use subloop_db::queries::ledger::{self, DailyTotals, TransactionRow};
use subloop_types::{day_of, SECONDS_PER_DAY};

use crate::Result;

/// Maximum page size for [`history`].
pub const MAX_HISTORY_LIMIT: u32 = 200;

/// Maximum number of days in an [`earnings_chart`].
pub const MAX_CHART_DAYS: u32 = 365;

/// Summary of a user's credit flows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreditStats {
    pub total_earned: i64,
    pub total_spent: i64,
    /// Earned since the start of the current UTC day.
    pub today_earned: i64,
    /// Earned in the trailing seven days.
    pub weekly_earned: i64,
    pub net_balance: i64,
}

/// Compute a user's [`CreditStats`] as of `now`.
pub fn credit_stats(conn: &Connection, user_id: &str, now: u64) -> Result<CreditStats> {
    let (total_earned, total_spent) = ledger::totals_since(conn, user_id, 0)?;
    let (today_earned, _) = ledger::totals_since(conn, user_id, day_of(now) * SECONDS_PER_DAY)?;
    let week_start = now.saturating_sub(7 * SECONDS_PER_DAY);
    let (weekly_earned, _) = ledger::totals_since(conn, user_id, week_start)?;

    Ok(CreditStats {
        total_earned,
        total_spent,
        today_earned,
        weekly_earned,
        net_balance: total_earned - total_spent,
    })
}

/// Per-day earned/spent totals for the last `days` UTC days including
/// today, oldest first. Days without activity are reported as zero.
pub fn earnings_chart(
    conn: &Connection,
    user_id: &str,
    days: u32,
    now: u64,
) -> Result<Vec<DailyTotals>> {
    let days = u64::from(days.clamp(1, MAX_CHART_DAYS));
    let today = day_of(now);
    let first_day = today.saturating_sub(days - 1);

    let recorded = ledger::daily_totals(conn, user_id, first_day * SECONDS_PER_DAY)?;
    let mut recorded = recorded.into_iter().peekable();

    let mut chart = Vec::with_capacity(days as usize);
    for day in first_day..=today {
        match recorded.next_if(|r| r.day == day) {
            Some(totals) => chart.push(totals),
            None => chart.push(DailyTotals {
                day,
                earned: 0,
                spent: 0,
            }),
        }
    }
    Ok(chart)
}

/// A page of the user's ledger, newest first. `limit` is capped at
/// [`MAX_HISTORY_LIMIT`].
pub fn history(
    conn: &Connection,
    user_id: &str,
    limit: u32,
    offset: u32,
) -> Result<Vec<TransactionRow>> {
    let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
    Ok(ledger::history(conn, user_id, limit, offset)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credits::add_credits;
    use subloop_db::queries::profiles;
    use subloop_types::TransactionType;

    const DAY: u64 = SECONDS_PER_DAY;

    fn setup() -> Connection {
        let conn = subloop_db::open_memory().expect("open");
        profiles::insert(&conn, "u1", "alice", None, 0).expect("profile");
        conn
    }

    #[test]
    fn test_credit_stats_windows() {
        let conn = setup();
        let now = 20 * DAY + 3600;
        add_credits(&conn, "u1", 100, TransactionType::SignupBonus, None, None, 2 * DAY)
            .expect("old");
        add_credits(&conn, "u1", 20, TransactionType::TaskReward, None, None, 15 * DAY)
            .expect("this week");
        add_credits(&conn, "u1", 5, TransactionType::TaskReward, None, None, 20 * DAY + 60)
            .expect("today");
        add_credits(&conn, "u1", -50, TransactionType::CampaignBudget, None, None, 20 * DAY + 120)
            .expect("spend");

        let stats = credit_stats(&conn, "u1", now).expect("stats");
        assert_eq!(stats.total_earned, 125);
        assert_eq!(stats.total_spent, 50);
        assert_eq!(stats.today_earned, 5);
        assert_eq!(stats.weekly_earned, 25);
        assert_eq!(stats.net_balance, 75);
        assert_eq!(stats.net_balance, profiles::credits(&conn, "u1").expect("credits"));
    }

    #[test]
    fn test_chart_fills_gaps() {
        let conn = setup();
        let now = 10 * DAY + 10;
        add_credits(&conn, "u1", 7, TransactionType::DailyReward, None, None, 8 * DAY + 5)
            .expect("add");
        let chart = earnings_chart(&conn, "u1", 3, now).expect("chart");
        let days: Vec<_> = chart.iter().map(|d| (d.day, d.earned)).collect();
        assert_eq!(days, vec![(8, 7), (9, 0), (10, 0)]);
    }

    #[test]
    fn test_history_limit_capped() {
        let conn = setup();
        for i in 0..3u64 {
            add_credits(&conn, "u1", 1, TransactionType::TaskReward, None, None, i).expect("add");
        }
        assert_eq!(history(&conn, "u1", 10_000, 0).expect("history").len(), 3);
        assert_eq!(history(&conn, "u1", 0, 0).expect("history").len(), 1);
    }
}
