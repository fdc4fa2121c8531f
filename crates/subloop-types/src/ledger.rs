//! Credit ledger enumerations.

use serde::{Deserialize, Serialize};

/// Reason attached to every `credit_transactions` row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum TransactionType {
    SignupBonus,
    TaskReward,
    CampaignBudget,
    CampaignRefund,
    ReferralBonus,
    AchievementBonus,
    StreakBonus,
    DailyReward,
    AdminAdjustment,
}

wire_enum!(TransactionType, "transaction type", {
    SignupBonus => "signup_bonus",
    TaskReward => "task_reward",
    CampaignBudget => "campaign_budget",
    CampaignRefund => "campaign_refund",
    ReferralBonus => "referral_bonus",
    AchievementBonus => "achievement_bonus",
    StreakBonus => "streak_bonus",
    DailyReward => "daily_reward",
    AdminAdjustment => "admin_adjustment",
});

impl TransactionType {
    /// Credits entering circulation from the platform rather than moving
    /// between users.
    pub fn is_platform_issued(&self) -> bool {
        matches!(
            self,
            TransactionType::SignupBonus
                | TransactionType::ReferralBonus
                | TransactionType::AchievementBonus
                | TransactionType::StreakBonus
                | TransactionType::DailyReward
                | TransactionType::AdminAdjustment
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_all() {
        for tx in TransactionType::ALL {
            assert_eq!(tx.as_str().parse::<TransactionType>().as_ref(), Ok(tx));
        }
    }

    #[test]
    fn test_platform_issued() {
        assert!(TransactionType::DailyReward.is_platform_issued());
        assert!(!TransactionType::TaskReward.is_platform_issued());
        assert!(!TransactionType::CampaignRefund.is_platform_issued());
    }
}
