// src/bus.rs
//
// Change-event bus for the store adapter.
//
// Every row-level change (like created/removed, match created, chat
// created, message created/updated, profile updated) is represented as a
// `StoreEvent`.  A single `StoreBus` backed by a `tokio::sync::broadcast`
// channel fans out each event to every consumer: the conversation
// registry, any open chat pipelines, and the presence-refresh path.
//
// Delivery is at-least-once relative to snapshot queries and carries no
// ordering guarantee; consumers must merge idempotently.
//
// ────────────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::models::{Chat, Like, Match, Message, Profile};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StoreEvent {
    LikeCreated(Like),
    LikeRemoved { liker_id: Uuid, liked_id: Uuid },
    MatchCreated(Match),
    ChatCreated(Chat),
    MessageCreated(Message),
    MessageUpdated(Message),
    ProfileUpdated(Profile),
}

impl StoreEvent {
    /// Stable event-kind string used in logs and filter expressions.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LikeCreated(_) => "like.created",
            Self::LikeRemoved { .. } => "like.removed",
            Self::MatchCreated(_) => "match.created",
            Self::ChatCreated(_) => "chat.created",
            Self::MessageCreated(_) => "message.created",
            Self::MessageUpdated(_) => "message.updated",
            Self::ProfileUpdated(_) => "profile.updated",
        }
    }

    /// Whether this event can possibly concern `user_id`, judged from the
    /// row alone.  Message events carry only a chat id, so they pass this
    /// filter and are resolved against the chat by the consumer.
    pub fn concerns(&self, user_id: Uuid) -> bool {
        match self {
            Self::LikeCreated(like) => like.liker_id == user_id || like.liked_id == user_id,
            Self::LikeRemoved { liker_id, liked_id } => {
                *liker_id == user_id || *liked_id == user_id
            }
            Self::MatchCreated(m) => m.pair().contains(user_id),
            Self::ChatCreated(chat) => chat.pair().contains(user_id),
            Self::MessageCreated(_) | Self::MessageUpdated(_) => true,
            Self::ProfileUpdated(profile) => profile.id == user_id,
        }
    }
}

/// Broadcast-based fan-out channel for `StoreEvent`.
///
/// Capacity is generous -- subscribers that lag more than that will skip
/// events (same semantic as `broadcast::RecvError::Lagged`).
///
/// The bus is cheap to clone (interior `Arc`).
#[derive(Clone)]
pub struct StoreBus {
    tx: broadcast::Sender<StoreEvent>,
}

impl StoreBus {
    pub const DEFAULT_CAPACITY: usize = 4096;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(cap: usize) -> Self {
        let (tx, _) = broadcast::channel(cap);
        Self { tx }
    }

    /// Publish an event.  Returns the number of active subscribers that
    /// will receive it.  Silently succeeds even with no subscribers.
    pub fn emit(&self, event: StoreEvent) -> usize {
        debug!(kind = event.kind(), "store event emitted");
        // broadcast::send returns Err only if there are 0 receivers, which
        // is perfectly normal before any registry or pipeline is open.
        self.tx.send(event).unwrap_or(0)
    }

    /// Obtain a new receiver.  Each receiver gets an independent copy of
    /// every event published *after* this call.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }
}

impl Default for StoreBus {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PairKey;
    use chrono::Utc;

    fn chat(a: Uuid, b: Uuid) -> Chat {
        Chat {
            id: Uuid::new_v4(),
            user_a: a,
            user_b: b,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn bus_fanout() {
        let bus = StoreBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let evt = StoreEvent::ChatCreated(chat(Uuid::new_v4(), Uuid::new_v4()));
        let n = bus.emit(evt);
        assert_eq!(n, 2);

        let e1 = rx1.recv().await.unwrap();
        let e2 = rx2.recv().await.unwrap();
        assert_eq!(e1.kind(), e2.kind());
    }

    #[test]
    fn concerns_filters_by_membership() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        let evt = StoreEvent::ChatCreated(chat(a, b));
        assert!(evt.concerns(a));
        assert!(evt.concerns(b));
        assert!(!evt.concerns(stranger));

        let (x, y) = PairKey::new(a, b).users();
        assert_eq!(PairKey::new(x, y), PairKey::new(a, b));
    }

    #[test]
    fn message_events_pass_the_row_level_filter() {
        let msg = Message {
            id: Uuid::new_v4(),
            chat_id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            content: "hi".into(),
            kind: crate::models::MessageKind::Text,
            media_url: None,
            status: crate::models::MessageStatus::Sent,
            created_at: Utc::now(),
        };
        // membership is not decidable from the row; consumers resolve it
        assert!(StoreEvent::MessageCreated(msg).concerns(Uuid::new_v4()));
    }
}
