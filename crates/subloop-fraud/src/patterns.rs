//! Behavioral pattern detection.
//!
//! Looks at task completion pace over the last hour and day, and at how
//! many distinct IPs and devices the account logged from in the last day.

use rusqlite::Connection;
use serde::Serialize;
use subloop_db::queries::{fraud, tasks};
use subloop_types::RiskLevel;

use crate::{Result, DAY, HOUR};

/// Completions closer together than this are treated as automated.
pub const MIN_HUMAN_INTERVAL_SECS: u64 = 5;

/// Signals and the combined score for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FraudPatterns {
    pub user_id: String,
    pub tasks_last_hour: u64,
    pub tasks_last_day: u64,
    pub distinct_ips_day: u64,
    pub distinct_devices_day: u64,
    /// Smallest gap between two completions in the last day.
    pub min_completion_interval_secs: Option<u64>,
    pub risk_score: u32,
    pub risk_level: RiskLevel,
}

/// Compute the account's current fraud patterns.
pub fn detect_patterns(conn: &Connection, user_id: &str, now: u64) -> Result<FraudPatterns> {
    let hour_ago = now.saturating_sub(HOUR);
    let day_ago = now.saturating_sub(DAY);

    let times = tasks::completion_times(conn, user_id, day_ago)?;
    let tasks_last_day = times.len() as u64;
    let tasks_last_hour = times.iter().filter(|&&t| t >= hour_ago).count() as u64;
    let min_completion_interval_secs = times.windows(2).map(|w| w[1] - w[0]).min();
    let (distinct_ips_day, distinct_devices_day) =
        fraud::distinct_sources_since(conn, user_id, day_ago)?;

    let mut risk_score = 0u32;
    if tasks_last_hour > 30 {
        risk_score += 40;
    }
    if tasks_last_day > 200 {
        risk_score += 20;
    }
    if distinct_ips_day > 5 {
        risk_score += 20;
    }
    if distinct_devices_day > 3 {
        risk_score += 10;
    }
    if min_completion_interval_secs.is_some_and(|gap| gap < MIN_HUMAN_INTERVAL_SECS) {
        risk_score += 20;
    }
    let risk_score = risk_score.min(100);

    Ok(FraudPatterns {
        user_id: user_id.to_string(),
        tasks_last_hour,
        tasks_last_day,
        distinct_ips_day,
        distinct_devices_day,
        min_completion_interval_secs,
        risk_score,
        risk_level: RiskLevel::from_score(risk_score),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_completions, seed_logs};

    #[test]
    fn test_quiet_account() {
        let conn = subloop_db::open_memory().expect("open");
        let p = detect_patterns(&conn, "worker", 10 * DAY).expect("patterns");
        assert_eq!(p.risk_score, 0);
        assert_eq!(p.risk_level, RiskLevel::Low);
        assert_eq!(p.min_completion_interval_secs, None);
    }

    #[test]
    fn test_fast_completions() {
        let conn = subloop_db::open_memory().expect("open");
        let now = 10 * DAY;
        // 31 completions one minute apart, all inside the last hour.
        let times: Vec<u64> = (0..31).map(|i| now - 3_000 + i * 60).collect();
        seed_completions(&conn, "worker", &times);

        let p = detect_patterns(&conn, "worker", now).expect("patterns");
        assert_eq!(p.tasks_last_hour, 31);
        assert_eq!(p.min_completion_interval_secs, Some(60));
        assert_eq!(p.risk_score, 40);
        assert_eq!(p.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_bot_like_account_is_high_risk() {
        let conn = subloop_db::open_memory().expect("open");
        let now = 10 * DAY;
        let times: Vec<u64> = (0..31).map(|i| now - 200 + i * 2).collect();
        seed_completions(&conn, "worker", &times);
        seed_logs(&conn, "worker", 6, 1, now - 100);

        let p = detect_patterns(&conn, "worker", now).expect("patterns");
        assert_eq!(p.min_completion_interval_secs, Some(2));
        assert_eq!(p.distinct_ips_day, 6);
        assert_eq!(p.risk_score, 80);
        assert_eq!(p.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_old_completions_ignored() {
        let conn = subloop_db::open_memory().expect("open");
        seed_completions(&conn, "worker", &[10, 11, 12]);
        let p = detect_patterns(&conn, "worker", 5 * DAY).expect("patterns");
        assert_eq!(p.tasks_last_day, 0);
        assert_eq!(p.risk_score, 0);
    }
}
