//! # subloop-types
//!
//! Shared domain types used across the subloop workspace.
//!
//! Every enumeration here has a stable lowercase wire form (`as_str()` /
//! [`std::str::FromStr`]) which is also the form stored in SQLite and the
//! form serialized to JSON for the single-page client.

/// Implements `as_str`, `Display` and `FromStr` for a fieldless enum using
/// the given wire strings.
macro_rules! wire_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $wire:literal),+ $(,)? }) => {
        impl $ty {
            /// All variants in declaration order.
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            /// Stable wire/storage form.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $wire),+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = $crate::ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok($ty::$variant),)+
                    other => Err($crate::ParseEnumError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

pub mod campaign;
pub mod events;
pub mod fraud;
pub mod identity;
pub mod ledger;
pub mod moderation;
pub mod task;

pub use campaign::CampaignStatus;
pub use fraud::{Recommendation, RiskLevel};
pub use identity::Role;
pub use ledger::TransactionType;
pub use moderation::{AppealStatus, BanType, ContentType, QueuePriority, QueueStatus, ReportStatus};
pub use task::{TaskStatus, TaskType};

/// Common type aliases. All ids are UUID strings.
pub type UserId = String;
pub type TaskId = String;
pub type CampaignId = String;
pub type VideoId = String;
pub type ReportId = String;
pub type BanId = String;
pub type QueueId = String;

/// Seconds in one UTC day. Streaks, daily rewards and chart buckets all use
/// the day number `ts / SECONDS_PER_DAY`.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// UTC day number for a Unix timestamp.
pub fn day_of(ts: u64) -> u64 {
    ts / SECONDS_PER_DAY
}

/// Error returned when parsing a wire string into one of the domain enums.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}
