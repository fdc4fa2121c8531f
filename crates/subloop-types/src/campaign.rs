//! Campaign enumerations.

use serde::{Deserialize, Serialize};

/// Campaign lifecycle.
///
/// ```text
/// active <-> paused
/// active | paused -> cancelled
/// active -> completed   (all target actions done)
/// ```
///
/// `completed` and `cancelled` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum CampaignStatus {
    Active,
    Paused,
    Completed,
    Cancelled,
}

wire_enum!(CampaignStatus, "campaign status", {
    Active => "active",
    Paused => "paused",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl CampaignStatus {
    /// Terminal statuses accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CampaignStatus::Completed | CampaignStatus::Cancelled)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// `fully_delivered` is true when every target action has been completed;
    /// only then may a campaign be marked completed.
    pub fn can_transition_to(&self, next: CampaignStatus, fully_delivered: bool) -> bool {
        use CampaignStatus::*;
        match (self, next) {
            (Active, Paused) | (Paused, Active) => true,
            (Active, Cancelled) | (Paused, Cancelled) => true,
            (Active, Completed) | (Paused, Completed) => fully_delivered,
            _ => false,
        }
    }
}
