//! The moderation queue.
//!
//! One queue item exists per piece of content. Flagging content that is
//! already queued merges the reasons, raises the priority and puts the item
//! back into `pending`.

use rusqlite::Connection;
use subloop_db::queries::moderation::{self, QueueRow};
use subloop_types::{ContentType, QueuePriority, QueueStatus};

use crate::{clean_text, ModerationError, Result};

pub const DEFAULT_QUEUE_LIMIT: u32 = 50;
pub const MAX_QUEUE_LIMIT: u32 = 200;
const MAX_NOTES_CHARS: usize = 2_000;

/// Queue `content` for review, or re-flag it if already queued.
pub fn auto_flag(
    conn: &Connection,
    content_type: ContentType,
    content_id: &str,
    reasons: &[String],
    now: u64,
) -> Result<QueueRow> {
    let priority = QueuePriority::High;
    match moderation::queue_item_for(conn, content_type, content_id)? {
        Some(existing) => {
            let mut merged = existing.flag_reasons.clone();
            for reason in reasons {
                if !merged.contains(reason) {
                    merged.push(reason.clone());
                }
            }
            moderation::reflag_queue_item(
                conn,
                &existing.id,
                &merged,
                existing.priority.max(priority),
                now,
            )?;
            tracing::info!(%content_type, content_id, "content re-flagged");
            Ok(moderation::get_queue_item(conn, &existing.id)?)
        }
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            moderation::insert_queue_item(
                conn,
                &id,
                content_type,
                content_id,
                reasons,
                true,
                priority,
                now,
            )?;
            tracing::info!(%content_type, content_id, "content auto-flagged");
            Ok(moderation::get_queue_item(conn, &id)?)
        }
    }
}

/// Queue items, highest priority first, oldest first within a priority.
pub fn moderation_queue(
    conn: &Connection,
    priority: Option<QueuePriority>,
    status: Option<QueueStatus>,
    limit: Option<u32>,
) -> Result<Vec<QueueRow>> {
    let limit = limit
        .filter(|&l| l > 0)
        .unwrap_or(DEFAULT_QUEUE_LIMIT)
        .min(MAX_QUEUE_LIMIT);
    Ok(moderation::list_queue(conn, priority, status, limit)?)
}

/// Record a moderator's decision on a queue item.
pub fn moderate_content(
    conn: &Connection,
    queue_id: &str,
    reviewer: &str,
    decision: QueueStatus,
    notes: Option<&str>,
    now: u64,
) -> Result<QueueRow> {
    if decision == QueueStatus::Pending {
        return Err(ModerationError::InvalidDecision(decision.to_string()));
    }
    let notes = clean_text("notes", notes, MAX_NOTES_CHARS, false)?;
    moderation::review_queue_item(conn, queue_id, reviewer, decision, notes.as_deref(), now)?;
    tracing::info!(queue_id, reviewer, %decision, "queue item reviewed");
    Ok(moderation::get_queue_item(conn, queue_id)?)
}
