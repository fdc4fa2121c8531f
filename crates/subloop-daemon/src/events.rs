//! Event emission.
//!
//! Events are pushed from the daemon to connected clients over the SSE
//! stream. Every subscriber has an independent buffer; a subscriber that
//! falls more than the buffer capacity behind skips the missed events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use subloop_types::events::{Event, EventType};
use tokio::sync::broadcast;

/// Event bus for broadcasting events to subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: Event) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            event = event.event_type.name(),
            user_id = event.user_id.as_deref().unwrap_or("*"),
            "event emitted"
        );
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }

    /// Subscribe to events. Returns a receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Number of events emitted so far.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

/// Per-connection filter for the event stream.
#[derive(Debug, Clone)]
pub struct EventFilter {
    /// Account the stream belongs to.
    pub user_id: String,
    /// Category filter: "economy", "progression", "safety", "system".
    /// `None` = everything.
    pub categories: Option<Vec<String>>,
    /// Moderator broadcasts are delivered only to admin streams.
    pub admin: bool,
}

impl EventFilter {
    /// Parse a comma-separated category list; empty or "all" means no filter.
    pub fn new(user_id: impl Into<String>, categories: Option<&str>) -> Self {
        let categories = categories
            .map(|list| {
                list.split(',')
                    .map(|c| c.trim().to_lowercase())
                    .filter(|c| !c.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|list| !list.is_empty() && !list.iter().any(|c| c == "all"));
        Self {
            user_id: user_id.into(),
            categories,
            admin: false,
        }
    }

    pub fn with_admin(mut self, admin: bool) -> Self {
        self.admin = admin;
        self
    }

    /// Check if an event should reach this subscriber.
    pub fn matches(&self, event: &Event) -> bool {
        if !event.visible_to(&self.user_id) {
            return false;
        }
        if event.user_id.is_none() && is_moderator_event(event.event_type) && !self.admin {
            return false;
        }
        match &self.categories {
            Some(categories) => {
                let category = categorize_event(event.event_type);
                categories.iter().any(|c| c == category)
            }
            None => true,
        }
    }
}

/// Broadcasts meant for the moderation team only.
fn is_moderator_event(event_type: EventType) -> bool {
    matches!(event_type, EventType::ContentFlagged)
}

/// Categorize an event type.
pub fn categorize_event(event_type: EventType) -> &'static str {
    match event_type {
        EventType::CreditsChanged
        | EventType::TaskCompleted
        | EventType::CampaignCreated
        | EventType::CampaignStatusChanged
        | EventType::CampaignCompleted
        | EventType::ReferralProcessed => "economy",
        EventType::LevelUp | EventType::AchievementUnlocked => "progression",
        EventType::UserBanned | EventType::ContentFlagged => "safety",
        EventType::DaemonStarted => "system",
    }
}
