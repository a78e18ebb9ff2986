use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use lumo_shared::StoreError;

use crate::bus::StoreEvent;
use crate::models::{
    Chat, Like, Match, Message, NewLike, NewMessage, NewProfile, PairKey, Profile, ProfilePatch,
};

pub type StoreResult<T> = Result<T, StoreError>;

/// Interface to the backing relational store service.
///
/// Five collections (`profiles`, `likes`, `matches`, `chats`, `messages`)
/// with typed create/read/update operations plus a row-level change feed.
///
/// Contract notes:
/// - All `create_*` operations for uniquely-keyed rows (like per ordered
///   pair, match and chat per unordered pair, profile per user id) are
///   create-if-absent: a concurrent identical create returns the existing
///   row instead of erroring or duplicating.
/// - The change feed is at-least-once and carries no ordering guarantee
///   relative to snapshot queries; consumers must merge idempotently.
#[async_trait]
pub trait Store: Send + Sync {
    // --- profiles ---

    async fn create_profile(&self, row: NewProfile) -> StoreResult<Profile>;

    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<Profile>>;

    async fn update_profile(&self, id: Uuid, patch: ProfilePatch) -> StoreResult<Profile>;

    /// Every profile except the given user's own, for people pickers.
    async fn list_profiles_except(&self, user_id: Uuid) -> StoreResult<Vec<Profile>>;

    // --- likes ---

    async fn create_like(&self, row: NewLike) -> StoreResult<Like>;

    async fn find_like(&self, liker_id: Uuid, liked_id: Uuid) -> StoreResult<Option<Like>>;

    /// Removes the directed edge; returns whether an edge existed.
    async fn remove_like(&self, liker_id: Uuid, liked_id: Uuid) -> StoreResult<bool>;

    async fn likes_received(&self, user_id: Uuid) -> StoreResult<Vec<Like>>;

    async fn likes_sent(&self, user_id: Uuid) -> StoreResult<Vec<Like>>;

    // --- matches ---

    async fn create_match(&self, user_a: Uuid, user_b: Uuid) -> StoreResult<Match>;

    async fn matches_for(&self, user_id: Uuid) -> StoreResult<Vec<Match>>;

    // --- chats ---

    async fn create_chat(&self, user_a: Uuid, user_b: Uuid) -> StoreResult<Chat>;

    async fn get_chat(&self, chat_id: Uuid) -> StoreResult<Option<Chat>>;

    async fn find_chat(&self, pair: PairKey) -> StoreResult<Option<Chat>>;

    async fn chats_for(&self, user_id: Uuid) -> StoreResult<Vec<Chat>>;

    // --- messages ---

    async fn create_message(&self, row: NewMessage) -> StoreResult<Message>;

    /// All messages of a chat, created_at ascending.
    async fn messages_for_chat(&self, chat_id: Uuid) -> StoreResult<Vec<Message>>;

    async fn latest_message(&self, chat_id: Uuid) -> StoreResult<Option<Message>>;

    /// Count of messages in the chat with status `sent` not authored by
    /// `reader_id`.
    async fn unread_count(&self, chat_id: Uuid, reader_id: Uuid) -> StoreResult<u64>;

    /// Advances every inbound `sent` message in the chat to `read` in one
    /// batch, emitting one update event per row.  Returns how many rows
    /// changed; calling again immediately is a no-op.
    async fn mark_messages_read(&self, chat_id: Uuid, reader_id: Uuid) -> StoreResult<usize>;

    // --- change feed ---

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}
