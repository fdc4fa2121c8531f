//! Fraud scoring enumerations.

use serde::{Deserialize, Serialize};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ts_rs::TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

wire_enum!(RiskLevel, "risk level", {
    Low => "low",
    Medium => "medium",
    High => "high",
});

impl RiskLevel {
    /// Bucket a 0..=100 risk score: `>= 60` high, `>= 30` medium.
    pub fn from_score(score: u32) -> Self {
        if score >= 60 {
            RiskLevel::High
        } else if score >= 30 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Action suggested to moderators after a fraud check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Recommendation {
    Monitor,
    Review,
    Ban,
}

wire_enum!(Recommendation, "recommendation", {
    Monitor => "monitor",
    Review => "review",
    Ban => "ban",
});
