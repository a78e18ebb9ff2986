use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use uuid::Uuid;

use lumo_profiles::is_online;
use lumo_shared::{AppResult, Session};
use lumo_store::Store;

use crate::inbox::{ConversationEntry, InboxFilter, InboxState, MergeAction};

/// Live handle on the signed-in user's conversation list.
///
/// `open` fetches the snapshot (matches, chats, their messages), subscribes
/// to the change feed, and keeps merging until `close` (or drop) stops the
/// task.  Any single failed merge step is logged and skipped -- the view is
/// continuously refreshing, so stale beats dead.
pub struct InboxHandle {
    me: Uuid,
    store: Arc<dyn Store>,
    state: Arc<Mutex<InboxState>>,
    task: JoinHandle<()>,
}

impl InboxHandle {
    pub async fn open(store: Arc<dyn Store>, session: &Session) -> AppResult<Self> {
        let me = session.user_id;

        // Subscribe before the snapshot so nothing falls in the gap; the
        // merge is idempotent, so seeing a row twice is harmless.
        let mut rx = store.subscribe();

        let mut state = InboxState::new(me);
        for m in store.matches_for(me).await? {
            state.admit_match(m);
        }
        for chat in store.chats_for(me).await? {
            let chat_id = chat.id;
            state.admit_chat(chat);
            for message in store.messages_for_chat(chat_id).await? {
                state.apply_message(message);
            }
        }

        let state = Arc::new(Mutex::new(state));
        let task = {
            let state = state.clone();
            let store = store.clone();
            tokio::spawn(async move {
                loop {
                    let event = match rx.recv().await {
                        Ok(event) => event,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "inbox feed lagged, view may be stale");
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    };
                    if !event.concerns(me) {
                        continue;
                    }

                    let action = state.lock().expect("inbox lock poisoned").apply_event(event);
                    if let MergeAction::FetchChat(chat_id) = action {
                        match store.get_chat(chat_id).await {
                            Ok(Some(chat)) => {
                                // admit_chat self-discards chats of strangers
                                state.lock().expect("inbox lock poisoned").admit_chat(chat);
                            }
                            Ok(None) => {
                                // row not visible yet; a later event retries
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, chat_id = %chat_id, "chat lookup failed, skipping merge step");
                            }
                        }
                    }
                }
            })
        };

        Ok(Self { me, store, state, task })
    }

    /// Current view, most recently active first.  `Unread` keeps entries
    /// with pending inbound messages; `Online` keeps entries whose other
    /// party is currently online per the presence estimator.
    pub async fn snapshot(&self, filter: InboxFilter) -> AppResult<Vec<ConversationEntry>> {
        let entries = self.state.lock().expect("inbox lock poisoned").entries();

        match filter {
            InboxFilter::All => Ok(entries),
            InboxFilter::Unread => Ok(entries.into_iter().filter(|e| e.unread() > 0).collect()),
            InboxFilter::Online => {
                let now = Utc::now();
                let mut online = Vec::new();
                for entry in entries {
                    match self.store.get_profile(entry.other()).await {
                        Ok(Some(profile)) if is_online(&profile, now) => online.push(entry),
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!(error = %e, other = %entry.other(), "presence lookup failed, treating as offline");
                        }
                    }
                }
                Ok(online)
            }
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.me
    }

    /// Detach from the change feed.  The merge task stops and the view is
    /// frozen; it never mutates state after this.
    pub async fn close(self) {
        self.task.abort();
    }
}

impl Drop for InboxHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use lumo_store::{
        MemoryStore, MessageKind, NewLike, NewMessage, NewProfile, ProfilePatch,
    };
    use std::time::Duration as StdDuration;

    async fn seed(store: &MemoryStore, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        store
            .create_profile(NewProfile {
                id,
                full_name: name.into(),
                age: Some(24),
                location: None,
                bio: None,
                interests: None,
                looking_for: None,
                selfie_url: None,
            })
            .await
            .unwrap();
        id
    }

    async fn settle() {
        tokio::time::sleep(StdDuration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn one_sided_like_shows_nothing() {
        let store = Arc::new(MemoryStore::new());
        let a = seed(&store, "Ana").await;
        let b = seed(&store, "Ben").await;

        let inbox = InboxHandle::open(store.clone(), &Session::new(a)).await.unwrap();
        store
            .create_like(NewLike { liker_id: a, liked_id: b })
            .await
            .unwrap();
        settle().await;

        assert!(inbox.snapshot(InboxFilter::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn streamed_match_then_chat_promotes_once() {
        let store = Arc::new(MemoryStore::new());
        let a = seed(&store, "Ana").await;
        let b = seed(&store, "Ben").await;

        let inbox_a = InboxHandle::open(store.clone(), &Session::new(a)).await.unwrap();
        let inbox_b = InboxHandle::open(store.clone(), &Session::new(b)).await.unwrap();

        store.create_match(a, b).await.unwrap();
        settle().await;

        let entries = inbox_a.snapshot(InboxFilter::All).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(matches!(entries[0], ConversationEntry::NewMatch { .. }));

        store.create_chat(a, b).await.unwrap();
        settle().await;

        for inbox in [&inbox_a, &inbox_b] {
            let entries = inbox.snapshot(InboxFilter::All).await.unwrap();
            assert_eq!(entries.len(), 1, "pair must never appear twice");
            assert!(matches!(entries[0], ConversationEntry::Active { .. }));
        }
    }

    #[tokio::test]
    async fn snapshot_and_stream_overlap_does_not_duplicate() {
        let store = Arc::new(MemoryStore::new());
        let a = seed(&store, "Ana").await;
        let b = seed(&store, "Ben").await;

        // data exists before open; events replay cannot duplicate it
        store.create_match(a, b).await.unwrap();
        let chat = store.create_chat(a, b).await.unwrap();
        store
            .create_message(NewMessage {
                chat_id: chat.id,
                sender_id: b,
                content: "hello!".into(),
                kind: MessageKind::Text,
                media_url: None,
            })
            .await
            .unwrap();

        let inbox = InboxHandle::open(store.clone(), &Session::new(a)).await.unwrap();
        let entries = inbox.snapshot(InboxFilter::All).await.unwrap();
        assert_eq!(entries.len(), 1);
        match &entries[0] {
            ConversationEntry::Active { preview, unread, .. } => {
                assert_eq!(preview, "hello!");
                assert_eq!(*unread, 1);
            }
            other => panic!("unexpected entry: {other:?}"),
        }
    }

    #[tokio::test]
    async fn inbound_message_bumps_preview_and_unread() {
        let store = Arc::new(MemoryStore::new());
        let a = seed(&store, "Ana").await;
        let b = seed(&store, "Ben").await;
        let chat = store.create_chat(a, b).await.unwrap();

        let inbox = InboxHandle::open(store.clone(), &Session::new(a)).await.unwrap();

        store
            .create_message(NewMessage {
                chat_id: chat.id,
                sender_id: b,
                content: "are you around?".into(),
                kind: MessageKind::Text,
                media_url: None,
            })
            .await
            .unwrap();
        settle().await;

        let entries = inbox.snapshot(InboxFilter::Unread).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].unread(), 1);

        store.mark_messages_read(chat.id, a).await.unwrap();
        settle().await;

        assert!(inbox.snapshot(InboxFilter::Unread).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn online_filter_consults_presence() {
        let store = Arc::new(MemoryStore::new());
        let a = seed(&store, "Ana").await;
        let b = seed(&store, "Ben").await;
        let c = seed(&store, "Cleo").await;
        store.create_chat(a, b).await.unwrap();
        store.create_chat(a, c).await.unwrap();

        // only Ben is online
        let now = Utc::now();
        store
            .update_profile(
                b,
                ProfilePatch {
                    last_login_at: Some(now),
                    session_expires_at: Some(Some(now + Duration::hours(1))),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let inbox = InboxHandle::open(store.clone(), &Session::new(a)).await.unwrap();
        let online = inbox.snapshot(InboxFilter::Online).await.unwrap();
        assert_eq!(online.len(), 1);
        assert_eq!(online[0].other(), b);
    }

    #[tokio::test]
    async fn close_stops_the_merge_task() {
        let store = Arc::new(MemoryStore::new());
        let a = seed(&store, "Ana").await;
        let b = seed(&store, "Ben").await;

        let inbox = InboxHandle::open(store.clone(), &Session::new(a)).await.unwrap();
        inbox.close().await;

        // further writes go nowhere; nothing panics, nothing leaks
        store.create_chat(a, b).await.unwrap();
        settle().await;
    }
}
