//! Trust & safety enumerations.

use serde::{Deserialize, Serialize};

/// What a report or moderation queue item points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ContentType {
    Video,
    User,
    Campaign,
    Comment,
}

wire_enum!(ContentType, "content type", {
    Video => "video",
    User => "user",
    Campaign => "campaign",
    Comment => "comment",
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ReportStatus {
    Pending,
    Reviewing,
    Resolved,
    Dismissed,
}

wire_enum!(ReportStatus, "report status", {
    Pending => "pending",
    Reviewing => "reviewing",
    Resolved => "resolved",
    Dismissed => "dismissed",
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum BanType {
    Temporary,
    Permanent,
}

wire_enum!(BanType, "ban type", {
    Temporary => "temporary",
    Permanent => "permanent",
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum AppealStatus {
    Pending,
    Approved,
    Denied,
}

wire_enum!(AppealStatus, "appeal status", {
    Pending => "pending",
    Approved => "approved",
    Denied => "denied",
});

/// Moderation queue priority. Ordered: `Low < Medium < High < Urgent`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ts_rs::TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum QueuePriority {
    Low,
    Medium,
    High,
    Urgent,
}

wire_enum!(QueuePriority, "queue priority", {
    Low => "low",
    Medium => "medium",
    High => "high",
    Urgent => "urgent",
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum QueueStatus {
    Pending,
    Approved,
    Rejected,
}

wire_enum!(QueueStatus, "queue status", {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        assert!(QueuePriority::Urgent > QueuePriority::High);
        assert!(QueuePriority::Medium > QueuePriority::Low);
        assert_eq!(QueuePriority::High.max(QueuePriority::Low), QueuePriority::High);
    }

    #[test]
    fn test_parse() {
        assert_eq!("comment".parse::<ContentType>(), Ok(ContentType::Comment));
        assert!("post".parse::<ContentType>().is_err());
        assert_eq!("permanent".parse::<BanType>(), Ok(BanType::Permanent));
    }
}
