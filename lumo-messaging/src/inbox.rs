use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use lumo_store::{Chat, Match, Message, MessageStatus, PairKey, StoreEvent};

/// One line of the conversation list: a fresh match waiting for its first
/// message, or a live chat with its preview and unread counter.  A pair
/// appears as exactly one of the two.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ConversationEntry {
    NewMatch {
        match_id: Uuid,
        other: Uuid,
        matched_at: DateTime<Utc>,
    },
    Active {
        chat_id: Uuid,
        other: Uuid,
        preview: String,
        preview_at: DateTime<Utc>,
        unread: usize,
        last_activity: DateTime<Utc>,
    },
}

impl ConversationEntry {
    pub fn other(&self) -> Uuid {
        match self {
            Self::NewMatch { other, .. } | Self::Active { other, .. } => *other,
        }
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        match self {
            Self::NewMatch { matched_at, .. } => *matched_at,
            Self::Active { last_activity, .. } => *last_activity,
        }
    }

    pub fn unread(&self) -> usize {
        match self {
            Self::NewMatch { .. } => 0,
            Self::Active { unread, .. } => *unread,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InboxFilter {
    #[default]
    All,
    Unread,
    Online,
}

/// Preview text shown for a chat that has no messages yet.
pub const EMPTY_CHAT_PREVIEW: &str = "Say hello to start a conversation!";

/// Follow-up work a merge step asks of its driver.  The state itself stays
/// synchronous and pure; anything that needs the store is handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    None,
    /// A message arrived for a chat this state has never seen; the driver
    /// should look the chat up and feed it to [`InboxState::admit_chat`].
    FetchChat(Uuid),
}

struct ChatSlot {
    chat: Chat,
    last_message: Option<Message>,
    /// Ids of inbound messages still in `sent` status.  Keyed by id so
    /// at-least-once event delivery cannot double-count.
    unread: HashSet<Uuid>,
}

/// Merge core of the conversation registry.
///
/// Snapshot rows and streamed change events all funnel through the same
/// `admit_*`/`apply_*` operations, which are idempotent and insensitive to
/// arrival order: match-before-chat, chat-before-match, message-before-chat
/// and replayed events all converge to the same view.
pub struct InboxState {
    me: Uuid,
    matches: HashMap<PairKey, Match>,
    chats: HashMap<PairKey, ChatSlot>,
    chat_index: HashMap<Uuid, PairKey>,
    /// Messages for chats we have not resolved yet, folded in on admission.
    pending: HashMap<Uuid, Vec<Message>>,
    /// Chats confirmed to not involve us; their messages are dropped.
    foreign: HashSet<Uuid>,
}

impl InboxState {
    pub fn new(me: Uuid) -> Self {
        Self {
            me,
            matches: HashMap::new(),
            chats: HashMap::new(),
            chat_index: HashMap::new(),
            pending: HashMap::new(),
            foreign: HashSet::new(),
        }
    }

    /// Record a match row.  Hidden from the view once a chat exists for the
    /// same pair (the match row stays as audit history).
    pub fn admit_match(&mut self, m: Match) {
        if !m.pair().contains(self.me) {
            return;
        }
        self.matches.entry(m.pair()).or_insert(m);
    }

    /// Record a chat row, promoting any pending match entry for the pair
    /// and folding in messages that arrived before the chat did.
    pub fn admit_chat(&mut self, chat: Chat) {
        if self.chat_index.contains_key(&chat.id) {
            return;
        }
        if !chat.pair().contains(self.me) {
            self.discard_chat(chat.id);
            return;
        }

        self.chat_index.insert(chat.id, chat.pair());
        let buffered = self.pending.remove(&chat.id).unwrap_or_default();
        self.chats.insert(
            chat.pair(),
            ChatSlot {
                chat,
                last_message: None,
                unread: HashSet::new(),
            },
        );
        for message in buffered {
            self.apply_message(message);
        }
    }

    /// Mark a chat id as not ours and drop anything buffered for it.
    pub fn discard_chat(&mut self, chat_id: Uuid) {
        self.pending.remove(&chat_id);
        self.foreign.insert(chat_id);
    }

    /// Merge a message row (created or updated).
    pub fn apply_message(&mut self, message: Message) -> MergeAction {
        let Some(pair) = self.chat_index.get(&message.chat_id) else {
            if self.foreign.contains(&message.chat_id) {
                return MergeAction::None;
            }
            let buffer = self.pending.entry(message.chat_id).or_default();
            if !buffer.iter().any(|m| m.id == message.id) {
                buffer.push(message.clone());
            }
            return MergeAction::FetchChat(message.chat_id);
        };

        let Some(slot) = self.chats.get_mut(pair) else {
            return MergeAction::None;
        };

        if message.sender_id != self.me {
            match message.status {
                MessageStatus::Sent => {
                    slot.unread.insert(message.id);
                }
                MessageStatus::Read => {
                    slot.unread.remove(&message.id);
                }
            }
        }

        let replaces = match &slot.last_message {
            None => true,
            Some(current) => {
                current.id == message.id
                    || (message.created_at, message.id) > (current.created_at, current.id)
            }
        };
        if replaces {
            slot.last_message = Some(message);
        }

        MergeAction::None
    }

    /// Merge one streamed change event.
    pub fn apply_event(&mut self, event: StoreEvent) -> MergeAction {
        match event {
            StoreEvent::MatchCreated(m) => {
                self.admit_match(m);
                MergeAction::None
            }
            StoreEvent::ChatCreated(chat) => {
                self.admit_chat(chat);
                MergeAction::None
            }
            StoreEvent::MessageCreated(message) | StoreEvent::MessageUpdated(message) => {
                self.apply_message(message)
            }
            // likes and profile changes do not shape the conversation list
            StoreEvent::LikeCreated(_)
            | StoreEvent::LikeRemoved { .. }
            | StoreEvent::ProfileUpdated(_) => MergeAction::None,
        }
    }

    /// The de-duplicated view, most recently active first.
    pub fn entries(&self) -> Vec<ConversationEntry> {
        let mut entries: Vec<ConversationEntry> = Vec::new();

        for (pair, slot) in &self.chats {
            let Some(other) = pair.other(self.me) else {
                continue;
            };
            let (preview, preview_at) = match &slot.last_message {
                Some(m) => {
                    let text = if m.content.is_empty() {
                        "[media]".to_string()
                    } else {
                        m.content.clone()
                    };
                    (text, m.created_at)
                }
                None => (EMPTY_CHAT_PREVIEW.to_string(), slot.chat.created_at),
            };
            let last_activity = slot
                .last_message
                .as_ref()
                .map(|m| m.created_at)
                .unwrap_or(slot.chat.created_at);
            entries.push(ConversationEntry::Active {
                chat_id: slot.chat.id,
                other,
                preview,
                preview_at,
                unread: slot.unread.len(),
                last_activity,
            });
        }

        for (pair, m) in &self.matches {
            if self.chats.contains_key(pair) {
                continue; // promoted
            }
            let Some(other) = pair.other(self.me) else {
                continue;
            };
            entries.push(ConversationEntry::NewMatch {
                match_id: m.id,
                other,
                matched_at: m.created_at,
            });
        }

        entries.sort_by(|a, b| b.last_activity().cmp(&a.last_activity()));
        entries
    }
}
