//! Fraud log analysis, recommendations and platform-wide analytics.

use std::collections::{BTreeMap, HashSet};

use rusqlite::Connection;
use serde::Serialize;
use subloop_db::queries::fraud::{self, FraudLogRow};
use subloop_types::{Recommendation, RiskLevel};

use crate::patterns::{detect_patterns, FraudPatterns};
use crate::{Result, DAY, TASK_COMPLETE_EVENT};

/// Number of recent logs inspected by [`check_user`].
pub const CHECK_LOG_WINDOW: u32 = 100;

/// Default lookback for [`analytics`].
pub const DEFAULT_ANALYTICS_DAYS: u64 = 30;

/// Events scoring above this count as high risk in [`analytics`].
pub const HIGH_RISK_EVENT_SCORE: u32 = 70;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SuspiciousPatterns {
    pub has_multiple_ips: bool,
    pub has_multiple_devices: bool,
    pub high_task_completion_rate: bool,
    pub rapid_actions: bool,
}

impl SuspiciousPatterns {
    /// Number of flags set.
    pub fn count(&self) -> usize {
        [
            self.has_multiple_ips,
            self.has_multiple_devices,
            self.high_task_completion_rate,
            self.rapid_actions,
        ]
        .into_iter()
        .filter(|&flag| flag)
        .count()
    }
}

/// Summary of a batch of fraud logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LogAnalysis {
    pub unique_ips: usize,
    pub unique_devices: usize,
    pub event_types: BTreeMap<String, u64>,
    pub avg_risk_score: f64,
    pub suspicious_patterns: SuspiciousPatterns,
}

/// Summarize a batch of logs.
pub fn analyze_logs(logs: &[FraudLogRow]) -> LogAnalysis {
    if logs.is_empty() {
        return LogAnalysis::default();
    }

    let unique_ips = logs.iter().map(|l| l.ip_address.as_str()).collect::<HashSet<_>>().len();
    let unique_devices = logs
        .iter()
        .map(|l| l.device_fingerprint.as_str())
        .collect::<HashSet<_>>()
        .len();

    let mut event_types = BTreeMap::new();
    for log in logs {
        *event_types.entry(log.event_type.clone()).or_insert(0u64) += 1;
    }

    let total: u64 = logs.iter().map(|l| u64::from(l.risk_score)).sum();
    let avg_risk_score = total as f64 / logs.len() as f64;

    let task_completions = event_types.get(TASK_COMPLETE_EVENT).copied().unwrap_or(0);
    let suspicious_patterns = SuspiciousPatterns {
        has_multiple_ips: unique_ips > 5,
        has_multiple_devices: unique_devices > 3,
        high_task_completion_rate: task_completions > 50,
        rapid_actions: logs.len() > 100,
    };

    LogAnalysis {
        unique_ips,
        unique_devices,
        event_types,
        avg_risk_score,
        suspicious_patterns,
    }
}

/// Moderator recommendation from patterns and log analysis.
pub fn recommend(patterns: &FraudPatterns, analysis: &LogAnalysis) -> Recommendation {
    let flags = analysis.suspicious_patterns.count();
    if patterns.risk_level == RiskLevel::High || flags >= 3 {
        Recommendation::Ban
    } else if patterns.risk_level == RiskLevel::Medium || flags >= 2 {
        Recommendation::Review
    } else {
        Recommendation::Monitor
    }
}

/// Full fraud check for one account.
#[derive(Debug, Clone, Serialize)]
pub struct FraudCheck {
    #[serde(flatten)]
    pub patterns: FraudPatterns,
    #[serde(flatten)]
    pub analysis: LogAnalysis,
    pub recommendation: Recommendation,
}

/// Run pattern detection and analyze the account's latest logs.
pub fn check_user(conn: &Connection, user_id: &str, now: u64) -> Result<FraudCheck> {
    let patterns = detect_patterns(conn, user_id, now)?;
    let logs = fraud::recent_for_user(conn, user_id, CHECK_LOG_WINDOW)?;
    let analysis = analyze_logs(&logs);
    let recommendation = recommend(&patterns, &analysis);

    tracing::info!(
        user_id,
        risk_score = patterns.risk_score,
        %recommendation,
        "fraud check"
    );

    Ok(FraudCheck {
        patterns,
        analysis,
        recommendation,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RiskDistribution {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
}

/// Platform-wide fraud statistics over a time window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FraudAnalytics {
    pub start: u64,
    pub end: u64,
    pub total_events: u64,
    pub high_risk_events: u64,
    pub unique_users: u64,
    pub events_by_type: BTreeMap<String, u64>,
    pub risk_distribution: RiskDistribution,
}

/// Aggregate logs in `[start, end]`. Defaults to the last 30 days.
pub fn analytics(
    conn: &Connection,
    start: Option<u64>,
    end: Option<u64>,
    now: u64,
) -> Result<FraudAnalytics> {
    let end = end.unwrap_or(now);
    let start = start.unwrap_or_else(|| now.saturating_sub(DEFAULT_ANALYTICS_DAYS * DAY));
    let logs = fraud::between(conn, start, end)?;

    let mut users = HashSet::new();
    let mut events_by_type = BTreeMap::new();
    let mut risk_distribution = RiskDistribution::default();
    let mut high_risk_events = 0;

    for log in &logs {
        users.insert(log.user_id.as_str());
        *events_by_type.entry(log.event_type.clone()).or_insert(0u64) += 1;
        if log.risk_score > HIGH_RISK_EVENT_SCORE {
            high_risk_events += 1;
        }
        match log.risk_score {
            s if s < 30 => risk_distribution.low += 1,
            s if s < 70 => risk_distribution.medium += 1,
            _ => risk_distribution.high += 1,
        }
    }

    Ok(FraudAnalytics {
        start,
        end,
        total_events: logs.len() as u64,
        high_risk_events,
        unique_users: users.len() as u64,
        events_by_type,
        risk_distribution,
    })
}
