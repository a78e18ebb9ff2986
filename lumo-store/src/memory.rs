use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;
use uuid::Uuid;

use lumo_shared::StoreError;

use crate::bus::{StoreBus, StoreEvent};
use crate::models::{
    Chat, Like, Match, Message, MessageStatus, NewLike, NewMessage, NewProfile, PairKey, Profile,
    ProfilePatch,
};
use crate::store::{Store, StoreResult};

#[derive(Default)]
struct Tables {
    profiles: HashMap<Uuid, Profile>,
    likes: Vec<Like>,
    matches: Vec<Match>,
    chats: Vec<Chat>,
    messages: Vec<Message>,
}

/// Reference implementation of [`Store`] over in-process tables.
///
/// All tables live behind one mutex, so every create-if-absent operation is
/// atomic: two concurrent identical creates serialize on the lock and the
/// second one observes the first one's row.  Doubles as the test store, with
/// `set_offline` turning every operation into `StoreError::Unavailable`.
pub struct MemoryStore {
    tables: Mutex<Tables>,
    bus: StoreBus,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(StoreBus::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(event_capacity: usize) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            bus: StoreBus::with_capacity(event_capacity),
            offline: AtomicBool::new(false),
        }
    }

    /// Simulate a store outage: while offline, every operation fails with
    /// `StoreError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn guard(&self) -> StoreResult<std::sync::MutexGuard<'_, Tables>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated outage".into()));
        }
        Ok(self.tables.lock().expect("store lock poisoned"))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    // --- profiles ---

    async fn create_profile(&self, row: NewProfile) -> StoreResult<Profile> {
        let mut tables = self.guard()?;
        if let Some(existing) = tables.profiles.get(&row.id) {
            return Ok(existing.clone());
        }
        let profile = Profile {
            id: row.id,
            full_name: row.full_name,
            age: row.age,
            location: row.location,
            bio: row.bio,
            interests: row.interests,
            looking_for: row.looking_for,
            selfie_url: row.selfie_url,
            last_login_at: None,
            last_logout_at: None,
            session_expires_at: None,
            created_at: Utc::now(),
        };
        tables.profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        let tables = self.guard()?;
        Ok(tables.profiles.get(&id).cloned())
    }

    async fn update_profile(&self, id: Uuid, patch: ProfilePatch) -> StoreResult<Profile> {
        let mut tables = self.guard()?;
        let profile = tables
            .profiles
            .get_mut(&id)
            .ok_or(StoreError::NotFound("profile"))?;

        if let Some(v) = patch.full_name {
            profile.full_name = v;
        }
        if let Some(v) = patch.age {
            profile.age = Some(v);
        }
        if let Some(v) = patch.location {
            profile.location = Some(v);
        }
        if let Some(v) = patch.bio {
            profile.bio = Some(v);
        }
        if let Some(v) = patch.interests {
            profile.interests = Some(v);
        }
        if let Some(v) = patch.looking_for {
            profile.looking_for = Some(v);
        }
        if let Some(v) = patch.selfie_url {
            profile.selfie_url = Some(v);
        }
        if let Some(v) = patch.last_login_at {
            profile.last_login_at = Some(v);
        }
        if let Some(v) = patch.last_logout_at {
            profile.last_logout_at = Some(v);
        }
        if let Some(v) = patch.session_expires_at {
            profile.session_expires_at = v;
        }

        let updated = profile.clone();
        drop(tables);
        self.bus.emit(StoreEvent::ProfileUpdated(updated.clone()));
        Ok(updated)
    }

    async fn list_profiles_except(&self, user_id: Uuid) -> StoreResult<Vec<Profile>> {
        let tables = self.guard()?;
        let mut profiles: Vec<Profile> = tables
            .profiles
            .values()
            .filter(|p| p.id != user_id)
            .cloned()
            .collect();
        profiles.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(profiles)
    }

    // --- likes ---

    async fn create_like(&self, row: NewLike) -> StoreResult<Like> {
        let mut tables = self.guard()?;
        if let Some(existing) = tables
            .likes
            .iter()
            .find(|l| l.liker_id == row.liker_id && l.liked_id == row.liked_id)
        {
            return Ok(existing.clone());
        }
        let like = Like {
            id: Uuid::new_v4(),
            liker_id: row.liker_id,
            liked_id: row.liked_id,
            created_at: Utc::now(),
        };
        tables.likes.push(like.clone());
        drop(tables);
        self.bus.emit(StoreEvent::LikeCreated(like.clone()));
        Ok(like)
    }

    async fn find_like(&self, liker_id: Uuid, liked_id: Uuid) -> StoreResult<Option<Like>> {
        let tables = self.guard()?;
        Ok(tables
            .likes
            .iter()
            .find(|l| l.liker_id == liker_id && l.liked_id == liked_id)
            .cloned())
    }

    async fn remove_like(&self, liker_id: Uuid, liked_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.guard()?;
        let before = tables.likes.len();
        tables
            .likes
            .retain(|l| !(l.liker_id == liker_id && l.liked_id == liked_id));
        let removed = tables.likes.len() < before;
        drop(tables);
        if removed {
            self.bus.emit(StoreEvent::LikeRemoved { liker_id, liked_id });
        }
        Ok(removed)
    }

    async fn likes_received(&self, user_id: Uuid) -> StoreResult<Vec<Like>> {
        let tables = self.guard()?;
        let mut likes: Vec<Like> = tables
            .likes
            .iter()
            .filter(|l| l.liked_id == user_id)
            .cloned()
            .collect();
        likes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(likes)
    }

    async fn likes_sent(&self, user_id: Uuid) -> StoreResult<Vec<Like>> {
        let tables = self.guard()?;
        let mut likes: Vec<Like> = tables
            .likes
            .iter()
            .filter(|l| l.liker_id == user_id)
            .cloned()
            .collect();
        likes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(likes)
    }

    // --- matches ---

    async fn create_match(&self, user_a: Uuid, user_b: Uuid) -> StoreResult<Match> {
        let pair = PairKey::new(user_a, user_b);
        let mut tables = self.guard()?;
        if let Some(existing) = tables.matches.iter().find(|m| m.pair() == pair) {
            return Ok(existing.clone());
        }
        let (a, b) = pair.users();
        let m = Match {
            id: Uuid::new_v4(),
            user_a: a,
            user_b: b,
            created_at: Utc::now(),
        };
        tables.matches.push(m.clone());
        drop(tables);
        self.bus.emit(StoreEvent::MatchCreated(m.clone()));
        Ok(m)
    }

    async fn matches_for(&self, user_id: Uuid) -> StoreResult<Vec<Match>> {
        let tables = self.guard()?;
        Ok(tables
            .matches
            .iter()
            .filter(|m| m.pair().contains(user_id))
            .cloned()
            .collect())
    }

    // --- chats ---

    async fn create_chat(&self, user_a: Uuid, user_b: Uuid) -> StoreResult<Chat> {
        let pair = PairKey::new(user_a, user_b);
        let mut tables = self.guard()?;
        if let Some(existing) = tables.chats.iter().find(|c| c.pair() == pair) {
            return Ok(existing.clone());
        }
        let (a, b) = pair.users();
        let chat = Chat {
            id: Uuid::new_v4(),
            user_a: a,
            user_b: b,
            created_at: Utc::now(),
        };
        tables.chats.push(chat.clone());
        drop(tables);
        self.bus.emit(StoreEvent::ChatCreated(chat.clone()));
        Ok(chat)
    }

    async fn get_chat(&self, chat_id: Uuid) -> StoreResult<Option<Chat>> {
        let tables = self.guard()?;
        Ok(tables.chats.iter().find(|c| c.id == chat_id).cloned())
    }

    async fn find_chat(&self, pair: PairKey) -> StoreResult<Option<Chat>> {
        let tables = self.guard()?;
        Ok(tables.chats.iter().find(|c| c.pair() == pair).cloned())
    }

    async fn chats_for(&self, user_id: Uuid) -> StoreResult<Vec<Chat>> {
        let tables = self.guard()?;
        Ok(tables
            .chats
            .iter()
            .filter(|c| c.pair().contains(user_id))
            .cloned()
            .collect())
    }

    // --- messages ---

    async fn create_message(&self, row: NewMessage) -> StoreResult<Message> {
        let mut tables = self.guard()?;
        if !tables.chats.iter().any(|c| c.id == row.chat_id) {
            return Err(StoreError::NotFound("chat"));
        }
        let message = Message {
            id: Uuid::new_v4(),
            chat_id: row.chat_id,
            sender_id: row.sender_id,
            content: row.content,
            kind: row.kind,
            media_url: row.media_url,
            status: MessageStatus::Sent,
            created_at: Utc::now(),
        };
        tables.messages.push(message.clone());
        drop(tables);
        self.bus.emit(StoreEvent::MessageCreated(message.clone()));
        Ok(message)
    }

    async fn messages_for_chat(&self, chat_id: Uuid) -> StoreResult<Vec<Message>> {
        let tables = self.guard()?;
        let mut messages: Vec<Message> = tables
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(messages)
    }

    async fn latest_message(&self, chat_id: Uuid) -> StoreResult<Option<Message>> {
        let tables = self.guard()?;
        Ok(tables
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .cloned())
    }

    async fn unread_count(&self, chat_id: Uuid, reader_id: Uuid) -> StoreResult<u64> {
        let tables = self.guard()?;
        Ok(tables
            .messages
            .iter()
            .filter(|m| {
                m.chat_id == chat_id
                    && m.sender_id != reader_id
                    && m.status == MessageStatus::Sent
            })
            .count() as u64)
    }

    async fn mark_messages_read(&self, chat_id: Uuid, reader_id: Uuid) -> StoreResult<usize> {
        let mut tables = self.guard()?;
        let mut updated = Vec::new();
        for m in tables.messages.iter_mut() {
            if m.chat_id == chat_id
                && m.sender_id != reader_id
                && m.status == MessageStatus::Sent
            {
                m.status = MessageStatus::Read;
                updated.push(m.clone());
            }
        }
        drop(tables);
        let count = updated.len();
        for m in updated {
            self.bus.emit(StoreEvent::MessageUpdated(m));
        }
        Ok(count)
    }

    // --- change feed ---

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.bus.subscribe()
    }
}
