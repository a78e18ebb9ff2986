use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use uuid::Uuid;

use lumo_shared::{AppError, AppResult, ErrorCode, Session};
use lumo_store::{Message, MessageKind, MessageStatus, NewMessage, Store, StoreEvent};

use crate::echo::EchoGuard;

// --- Delivery state ---

/// Per-message delivery state as seen by this client.
///
/// `Sending` and `Failed` exist only locally; the store knows `Sent` and
/// `Read`.  Status only ever advances (`Sending -> Sent -> Read`), except
/// that a `Failed` placeholder returns to `Sending` on resend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    Sending,
    Sent,
    Read,
    Failed,
}

impl Delivery {
    fn rank(self) -> u8 {
        match self {
            Self::Sending | Self::Failed => 0,
            Self::Sent => 1,
            Self::Read => 2,
        }
    }

    /// Forward-only merge: a stale update never regresses the state.
    fn advance(self, next: Delivery) -> Delivery {
        if next.rank() >= self.rank() {
            next
        } else {
            self
        }
    }
}

impl From<MessageStatus> for Delivery {
    fn from(status: MessageStatus) -> Self {
        match status {
            MessageStatus::Sent => Self::Sent,
            MessageStatus::Read => Self::Read,
        }
    }
}

// --- Message view ---

/// Identity of a rendered message: a local optimistic placeholder or an
/// authoritative store row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MessageRef {
    Local(Uuid),
    Server(Uuid),
}

impl MessageRef {
    fn sort_id(&self) -> Uuid {
        match self {
            Self::Local(id) | Self::Server(id) => *id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub id: MessageRef,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub kind: MessageKind,
    pub media_url: Option<String>,
    pub delivery: Delivery,
    pub created_at: DateTime<Utc>,
}

impl MessageView {
    fn from_row(row: &Message) -> Self {
        Self {
            id: MessageRef::Server(row.id),
            chat_id: row.chat_id,
            sender_id: row.sender_id,
            content: row.content.clone(),
            kind: row.kind,
            media_url: row.media_url.clone(),
            delivery: row.status.into(),
            created_at: row.created_at,
        }
    }
}

// --- Timeline ---

/// Ordered, de-duplicated view of one chat's messages.
///
/// Rows arrive from the initial snapshot, the insert response, and the
/// change feed, in any order and possibly more than once; every path funnels
/// through the same id-keyed, forward-only merge so replays are no-ops.
/// Display order is strictly created_at ascending (id as tiebreak).
#[derive(Debug, Default)]
pub struct Timeline {
    entries: Vec<MessageView>,
    seen: HashSet<Uuid>,
}

impl Timeline {
    pub fn from_rows(rows: &[Message]) -> Self {
        let mut timeline = Self::default();
        for row in rows {
            timeline.apply_row(row);
        }
        timeline
    }

    /// Merge an authoritative row: insert it in sorted position, or advance
    /// the status of the already-present copy.
    pub fn apply_row(&mut self, row: &Message) {
        if self.seen.contains(&row.id) {
            if let Some(entry) = self
                .entries
                .iter_mut()
                .find(|e| e.id == MessageRef::Server(row.id))
            {
                entry.delivery = entry.delivery.advance(row.status.into());
            }
            return;
        }
        self.seen.insert(row.id);
        self.insert_sorted(MessageView::from_row(row));
    }

    /// Append an optimistic placeholder for a pending send.
    pub fn push_placeholder(&mut self, view: MessageView) {
        self.insert_sorted(view);
    }

    /// Swap a placeholder for the authoritative row it became, keeping the
    /// list sorted.  Falls back to a plain merge if the placeholder is gone.
    pub fn reconcile(&mut self, local_id: Uuid, row: &Message) {
        if self.seen.contains(&row.id) {
            // echo got here first; just drop the placeholder
            self.entries.retain(|e| e.id != MessageRef::Local(local_id));
            return;
        }
        match self
            .entries
            .iter()
            .position(|e| e.id == MessageRef::Local(local_id))
        {
            Some(idx) => {
                self.entries.remove(idx);
                self.seen.insert(row.id);
                self.insert_sorted(MessageView::from_row(row));
            }
            None => self.apply_row(row),
        }
    }

    pub fn mark_failed(&mut self, local_id: Uuid) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.id == MessageRef::Local(local_id))
        {
            entry.delivery = Delivery::Failed;
        }
    }

    /// Returns the payload of a failed placeholder and flips it back to
    /// `Sending` for a retry, preserving its identity and position.
    pub fn begin_resend(&mut self, local_id: Uuid) -> Option<MessageView> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == MessageRef::Local(local_id) && e.delivery == Delivery::Failed)?;
        entry.delivery = Delivery::Sending;
        Some(entry.clone())
    }

    /// Advance every inbound `Sent` entry to `Read`.
    pub fn mark_inbound_read(&mut self, reader_id: Uuid) {
        for entry in self.entries.iter_mut() {
            if entry.sender_id != reader_id && entry.delivery == Delivery::Sent {
                entry.delivery = Delivery::Read;
            }
        }
    }

    pub fn messages(&self) -> &[MessageView] {
        &self.entries
    }

    pub fn unread_inbound(&self, reader_id: Uuid) -> usize {
        self.entries
            .iter()
            .filter(|e| e.sender_id != reader_id && e.delivery == Delivery::Sent)
            .count()
    }

    fn insert_sorted(&mut self, view: MessageView) {
        let key = (view.created_at, view.id.sort_id());
        let idx = self
            .entries
            .partition_point(|e| (e.created_at, e.id.sort_id()) <= key);
        self.entries.insert(idx, view);
    }
}

// --- Send failure ---

/// A send that did not reach the store.  `local_id` identifies the retained
/// `Failed` placeholder for a later [`ChatHandle::resend`]; it is `None`
/// when the send was rejected before a placeholder existed.
#[derive(Debug)]
pub struct SendFailure {
    pub local_id: Option<Uuid>,
    pub error: AppError,
}

// --- Chat pipeline ---

/// Live handle on one chat: snapshot plus streamed updates, optimistic
/// sends, and read receipts.  Closing (or dropping) the handle stops the
/// event task; nothing mutates the timeline afterwards.
pub struct ChatHandle {
    chat_id: Uuid,
    session: Session,
    store: Arc<dyn Store>,
    state: Arc<Mutex<Timeline>>,
    echo: Arc<EchoGuard>,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for ChatHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatHandle")
            .field("chat_id", &self.chat_id)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl ChatHandle {
    /// Attaches to `chat_id`: verifies membership, marks inbound messages
    /// read, loads the snapshot, and starts consuming the change feed.
    pub async fn open(
        store: Arc<dyn Store>,
        session: Session,
        chat_id: Uuid,
        echo_ttl: Duration,
    ) -> AppResult<Self> {
        let chat = store
            .get_chat(chat_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::ChatNotFound, "chat not found"))?;
        if !chat.pair().contains(session.user_id) {
            return Err(AppError::new(
                ErrorCode::NotChatMember,
                "you are not a member of this chat",
            ));
        }

        // Subscribe before the snapshot so no event falls in the gap;
        // the merge tolerates the overlap.
        let mut rx = store.subscribe();

        // Opening the conversation is the read action.  A failure here only
        // leaves the unread counter stale, so it must not abort the open.
        if let Err(e) = store.mark_messages_read(chat_id, session.user_id).await {
            tracing::warn!(error = %e, chat_id = %chat_id, "mark-read on open failed");
        }

        let rows = store.messages_for_chat(chat_id).await?;
        let state = Arc::new(Mutex::new(Timeline::from_rows(&rows)));
        let echo = Arc::new(EchoGuard::new(echo_ttl));

        let task = {
            let state = state.clone();
            let echo = echo.clone();
            tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(StoreEvent::MessageCreated(m)) if m.chat_id == chat_id => {
                            if !echo.admit(m.id) {
                                // our own insert, already reconciled
                                continue;
                            }
                            state.lock().expect("timeline lock poisoned").apply_row(&m);
                        }
                        Ok(StoreEvent::MessageUpdated(m)) if m.chat_id == chat_id => {
                            state.lock().expect("timeline lock poisoned").apply_row(&m);
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, chat_id = %chat_id, "chat feed lagged");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            })
        };

        Ok(Self {
            chat_id,
            session,
            store,
            state,
            echo,
            task,
        })
    }

    /// Sends a message: the placeholder appears immediately, the
    /// authoritative row replaces it when the insert confirms, and the
    /// feed's echo of that insert is recognized and skipped.
    pub async fn send(
        &self,
        content: &str,
        kind: MessageKind,
        media_url: Option<String>,
    ) -> Result<MessageRef, SendFailure> {
        if content.trim().is_empty() && media_url.is_none() {
            return Err(SendFailure {
                local_id: None,
                error: AppError::new(ErrorCode::EmptyMessage, "message must have content or media"),
            });
        }

        let local_id = Uuid::new_v4();
        let placeholder = MessageView {
            id: MessageRef::Local(local_id),
            chat_id: self.chat_id,
            sender_id: self.session.user_id,
            content: content.to_string(),
            kind,
            media_url: media_url.clone(),
            delivery: Delivery::Sending,
            created_at: Utc::now(),
        };
        self.lock_state().push_placeholder(placeholder);

        self.commit(local_id, content.to_string(), kind, media_url)
            .await
    }

    /// Retries a failed send in place: same placeholder, same content, no
    /// second message.
    pub async fn resend(&self, local_id: Uuid) -> Result<MessageRef, SendFailure> {
        let payload = self.lock_state().begin_resend(local_id);
        let Some(view) = payload else {
            return Err(SendFailure {
                local_id: None,
                error: AppError::new(ErrorCode::MessageNotFound, "no failed message to resend"),
            });
        };

        self.commit(local_id, view.content, view.kind, view.media_url)
            .await
    }

    async fn commit(
        &self,
        local_id: Uuid,
        content: String,
        kind: MessageKind,
        media_url: Option<String>,
    ) -> Result<MessageRef, SendFailure> {
        let insert = self
            .store
            .create_message(NewMessage {
                chat_id: self.chat_id,
                sender_id: self.session.user_id,
                content,
                kind,
                media_url,
            })
            .await;

        match insert {
            Ok(row) => {
                self.echo.register(row.id);
                self.lock_state().reconcile(local_id, &row);
                Ok(MessageRef::Server(row.id))
            }
            Err(e) => {
                self.lock_state().mark_failed(local_id);
                tracing::warn!(error = %e, chat_id = %self.chat_id, "send failed");
                Err(SendFailure {
                    local_id: Some(local_id),
                    error: e.into(),
                })
            }
        }
    }

    /// Advances every inbound `sent` message to `read`, remotely and in the
    /// local view.  Stable: a second call is a no-op.
    pub async fn mark_read(&self) -> AppResult<usize> {
        let changed = self
            .store
            .mark_messages_read(self.chat_id, self.session.user_id)
            .await?;
        self.lock_state().mark_inbound_read(self.session.user_id);
        Ok(changed)
    }

    pub fn chat_id(&self) -> Uuid {
        self.chat_id
    }

    /// Current rendered view, created_at ascending.
    pub fn messages(&self) -> Vec<MessageView> {
        self.lock_state().messages().to_vec()
    }

    pub fn unread(&self) -> usize {
        self.lock_state().unread_inbound(self.session.user_id)
    }

    /// Detach from the chat and stop consuming the change feed.
    pub async fn close(self) {
        self.task.abort();
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, Timeline> {
        self.state.lock().expect("timeline lock poisoned")
    }
}

impl Drop for ChatHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
