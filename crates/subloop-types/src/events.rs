//! Event types for daemon-to-client notification.
//!
//! Events are pushed to connected clients over the server-sent events
//! stream. Every event concerning a single account carries that account's
//! id in `user_id` so streams can be filtered per user.

use serde::{Deserialize, Serialize};

/// Envelope for all daemon events.
#[derive(Clone, Debug, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct Event {
    pub event_type: EventType,
    /// Account the event concerns; `None` for broadcast events.
    pub user_id: Option<String>,
    pub timestamp: u64,
    #[ts(type = "unknown")]
    pub payload: serde_json::Value,
}

/// All event types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum EventType {
    // Economy
    CreditsChanged,
    TaskCompleted,
    CampaignCreated,
    CampaignStatusChanged,
    CampaignCompleted,
    ReferralProcessed,

    // Progression
    LevelUp,
    AchievementUnlocked,

    // Trust & safety
    UserBanned,
    ContentFlagged,

    // System
    DaemonStarted,
}

impl EventType {
    /// Name used as the SSE `event:` field.
    pub fn name(&self) -> &'static str {
        match self {
            EventType::CreditsChanged => "credits_changed",
            EventType::TaskCompleted => "task_completed",
            EventType::CampaignCreated => "campaign_created",
            EventType::CampaignStatusChanged => "campaign_status_changed",
            EventType::CampaignCompleted => "campaign_completed",
            EventType::ReferralProcessed => "referral_processed",
            EventType::LevelUp => "level_up",
            EventType::AchievementUnlocked => "achievement_unlocked",
            EventType::UserBanned => "user_banned",
            EventType::ContentFlagged => "content_flagged",
            EventType::DaemonStarted => "daemon_started",
        }
    }
}

impl Event {
    /// Event addressed to one account.
    pub fn for_user(
        event_type: EventType,
        user_id: impl Into<String>,
        timestamp: u64,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_type,
            user_id: Some(user_id.into()),
            timestamp,
            payload,
        }
    }

    /// Event visible to every connected client.
    pub fn broadcast(event_type: EventType, timestamp: u64, payload: serde_json::Value) -> Self {
        Self {
            event_type,
            user_id: None,
            timestamp,
            payload,
        }
    }

    /// Whether a client authenticated as `user_id` should receive this event.
    pub fn visible_to(&self, user_id: &str) -> bool {
        match &self.user_id {
            Some(owner) => owner == user_id,
            None => true,
        }
    }
}
