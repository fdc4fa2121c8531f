//! # subloop-fraud
//!
//! Fraud signals for the task economy.
//!
//! Every notable client action is written to `fraud_logs` with a risk score
//! computed from the account's recent history. Pattern detection combines
//! those logs with task completion timing, and the analysis layer turns both
//! into a moderator recommendation.
//!
//! ## Modules
//!
//! - [`logging`]: Event logging with per-event risk scoring
//! - [`patterns`]: Completion-rate and source-spread detection
//! - [`analysis`]: Log analysis, recommendations and platform analytics
//! - [`rate_limit`]: Sliding-window action limits over the fraud log

pub mod analysis;
pub mod logging;
pub mod patterns;
pub mod rate_limit;

pub use analysis::{
    analytics, analyze_logs, check_user, recommend, FraudAnalytics, FraudCheck, LogAnalysis,
};
pub use logging::{log_event, LogEvent};
pub use patterns::{detect_patterns, FraudPatterns};
pub use rate_limit::{rate_limit_check, RateLimit};

use subloop_db::DbError;

/// Event type recorded for every successful task completion.
pub const TASK_COMPLETE_EVENT: &str = "task_complete";

/// Error types for fraud operations.
#[derive(Debug, thiserror::Error)]
pub enum FraudError {
    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error("invalid {field}: must be 1..={max} characters")]
    InvalidField { field: &'static str, max: usize },
}

/// Convenience result type for fraud operations.
pub type Result<T> = std::result::Result<T, FraudError>;

pub(crate) const HOUR: u64 = 3_600;
pub(crate) const DAY: u64 = subloop_types::SECONDS_PER_DAY;

#[cfg(test)]
pub(crate) mod test_support {
    use rusqlite::Connection;
    use subloop_db::queries::{campaigns, fraud, profiles, tasks, videos};
    use subloop_types::TaskType;

    /// Create `user` and one completed assignment per entry in `times`.
    pub fn seed_completions(conn: &Connection, user_id: &str, times: &[u64]) {
        profiles::insert(conn, "owner", "owner", None, 0).expect("owner");
        profiles::insert(conn, user_id, user_id, None, 0).expect("user");
        videos::upsert(
            conn,
            "v1",
            &videos::NewVideo {
                youtube_id: "dQw4w9WgXcQ".into(),
                title: "Video".into(),
                ..Default::default()
            },
            0,
        )
        .expect("video");
        campaigns::insert(
            conn,
            &campaigns::NewCampaign {
                id: "c1",
                user_id: "owner",
                video_id: "v1",
                title: "Seed",
                description: None,
                target_actions: 1000,
                credits_allocated: 1000,
            },
            0,
        )
        .expect("campaign");
        for (i, &at) in times.iter().enumerate() {
            let task_id = format!("t{i}");
            tasks::insert(
                conn,
                &tasks::NewTask {
                    id: &task_id,
                    campaign_id: "c1",
                    video_id: "v1",
                    task_type: TaskType::Watch,
                    credits_reward: 1,
                    created_by: "owner",
                },
                0,
            )
            .expect("task");
            tasks::complete_assignment(conn, &format!("ut{i}"), user_id, &task_id, 1, at)
                .expect("complete");
        }
    }

    /// Insert `count_per_ip` logs for each of `ips` addresses.
    pub fn seed_logs(conn: &Connection, user_id: &str, ips: u64, count_per_ip: u64, at: u64) {
        for ip in 0..ips {
            for n in 0..count_per_ip {
                fraud::insert(
                    conn,
                    &fraud::FraudLogRow {
                        id: format!("{user_id}-{ip}-{n}"),
                        user_id: user_id.to_string(),
                        ip_address: format!("10.0.0.{ip}"),
                        device_fingerprint: "dev".into(),
                        event_type: "task_complete".into(),
                        event_details: serde_json::json!({}),
                        risk_score: 0,
                        created_at: at,
                    },
                )
                .expect("log");
            }
        }
    }
}
