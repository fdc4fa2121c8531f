//! Task enumerations.

use serde::{Deserialize, Serialize};

/// The kind of YouTube engagement a task asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum TaskType {
    Watch,
    Like,
    Subscribe,
}

wire_enum!(TaskType, "task type", {
    Watch => "watch",
    Like => "like",
    Subscribe => "subscribe",
});

/// Lifecycle of a task, and of a user's assignment to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

wire_enum!(TaskStatus, "task status", {
    Pending => "pending",
    InProgress => "in_progress",
    Completed => "completed",
    Failed => "failed",
});

impl TaskStatus {
    /// Whether a task in this status can still be completed.
    pub fn is_open(&self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::InProgress)
    }
}
