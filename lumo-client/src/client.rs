use std::sync::Arc;

use uuid::Uuid;

use lumo_matching::LikeEngine;
use lumo_messaging::{ChatHandle, InboxHandle, MessageRef};
use lumo_profiles::{complete_signup, record_login, record_logout, ProfileInput};
use lumo_shared::{AppConfig, AppError, AppResult, AuthProvider, ErrorCode, Session, StoreError};
use lumo_store::{Chat, Message, MessageKind, NewMessage, Profile, Store};

/// Session-scoped entry point for a presentation layer.
///
/// Holds the resolved session and the store handle; everything below it
/// receives both explicitly.  Built at sign-in, discarded at sign-out.
pub struct LumoClient {
    config: AppConfig,
    store: Arc<dyn Store>,
    session: Session,
}

impl std::fmt::Debug for LumoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LumoClient")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl LumoClient {
    /// Resolves the current session from the auth collaborator and stamps
    /// the login timestamps.  Fails fast when nobody is signed in.
    pub async fn sign_in(
        auth: &dyn AuthProvider,
        store: Arc<dyn Store>,
        config: AppConfig,
    ) -> AppResult<Self> {
        let session = auth
            .current_session()
            .ok_or_else(|| AppError::not_authenticated("no active session"))?;

        match record_login(store.as_ref(), &session, config.session_ttl()).await {
            Ok(_) => {}
            // signing in before profile setup is a normal first-run path
            Err(AppError::Store(StoreError::NotFound(_))) => {
                tracing::debug!(user_id = %session.user_id, "login before profile setup");
            }
            Err(e) => return Err(e),
        }

        tracing::info!(user_id = %session.user_id, "client session started");
        Ok(Self {
            config,
            store,
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Creates the user's profile from the signup payload.
    pub async fn complete_signup(&self, input: ProfileInput) -> AppResult<Profile> {
        complete_signup(self.store.as_ref(), &self.session, input).await
    }

    pub async fn my_profile(&self) -> AppResult<Profile> {
        lumo_profiles::fetch_profile(self.store.as_ref(), self.session.user_id).await
    }

    /// Everyone except the signed-in user, for the new-message picker.
    pub async fn browse_profiles(&self) -> AppResult<Vec<Profile>> {
        Ok(self.store.list_profiles_except(self.session.user_id).await?)
    }

    /// The like/match engine acting as this session's user.
    pub fn engine(&self) -> LikeEngine {
        LikeEngine::new(self.store.clone(), self.session.clone())
    }

    /// Opens the live conversation list.  Close the handle when leaving the
    /// screen.
    pub async fn open_inbox(&self) -> AppResult<InboxHandle> {
        InboxHandle::open(self.store.clone(), &self.session).await
    }

    /// Attaches to one chat for messaging.  Opening marks inbound messages
    /// read.  Close the handle when leaving the screen.
    pub async fn open_chat(&self, chat_id: Uuid) -> AppResult<ChatHandle> {
        ChatHandle::open(
            self.store.clone(),
            self.session.clone(),
            chat_id,
            self.config.echo_ttl(),
        )
        .await
    }

    /// The quick-connect flow: ensure the chat for the pair exists and put
    /// the opening message in it, so the caller can jump straight into the
    /// conversation.  The insert is authoritative -- no timeline is open
    /// yet, so there is no optimistic placeholder to reconcile.
    pub async fn quick_connect(&self, target: Uuid, message: &str) -> AppResult<(Chat, Message)> {
        if message.trim().is_empty() {
            return Err(AppError::new(
                ErrorCode::EmptyMessage,
                "opening message must not be empty",
            ));
        }

        let chat = self.engine().ensure_chat(target).await?;
        let sent = self
            .store
            .create_message(NewMessage {
                chat_id: chat.id,
                sender_id: self.session.user_id,
                content: message.to_string(),
                kind: MessageKind::Text,
                media_url: None,
            })
            .await?;

        tracing::info!(chat_id = %chat.id, target = %target, "quick connect");
        Ok((chat, sent))
    }

    /// Stamps the logout timestamps and tears the session down.
    pub async fn sign_out(self, auth: &dyn AuthProvider) -> AppResult<()> {
        match record_logout(self.store.as_ref(), &self.session).await {
            Ok(_) => {}
            Err(AppError::Store(StoreError::NotFound(_))) => {
                tracing::debug!(user_id = %self.session.user_id, "logout without profile");
            }
            Err(e) => return Err(e),
        }
        auth.sign_out();
        tracing::info!(user_id = %self.session.user_id, "client session ended");
        Ok(())
    }

    /// Convenience for `send` returning the authoritative id from a quick
    /// one-off message without keeping a chat handle around.
    pub async fn send_once(&self, chat_id: Uuid, content: &str) -> AppResult<MessageRef> {
        let handle = self.open_chat(chat_id).await?;
        let sent = handle
            .send(content, MessageKind::Text, None)
            .await
            .map_err(|f| f.error)?;
        handle.close().await;
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumo_matching::LikeOutcome;
    use lumo_messaging::{ConversationEntry, Delivery, InboxFilter};
    use lumo_shared::StaticAuth;
    use lumo_store::MemoryStore;
    use std::time::Duration;

    fn input(name: &str) -> ProfileInput {
        ProfileInput {
            full_name: name.into(),
            age: 25,
            location: "Paris, France".into(),
            bio: None,
            interests: vec!["hiking".into()],
            looking_for: None,
            selfie_url: None,
        }
    }

    async fn signed_in(store: &Arc<MemoryStore>, name: &str) -> LumoClient {
        let auth = StaticAuth::signed_in(Session::new(Uuid::new_v4()));
        let client = LumoClient::sign_in(
            &auth,
            store.clone() as Arc<dyn Store>,
            AppConfig::default(),
        )
        .await
        .unwrap();
        client.complete_signup(input(name)).await.unwrap();
        client
    }

    #[tokio::test]
    async fn sign_in_requires_a_session() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let err = LumoClient::sign_in(&StaticAuth::signed_out(), store, AppConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Known { code: ErrorCode::NotAuthenticated, .. }
        ));
    }

    #[tokio::test]
    async fn mutual_like_lands_in_both_inboxes() {
        let store = Arc::new(MemoryStore::new());
        let ana = signed_in(&store, "Ana").await;
        let ben = signed_in(&store, "Ben").await;

        let inbox_ana = ana.open_inbox().await.unwrap();
        let inbox_ben = ben.open_inbox().await.unwrap();

        ana.engine().submit_like(ben.session().user_id).await.unwrap();
        let outcome = ben.engine().submit_like(ana.session().user_id).await.unwrap();
        let LikeOutcome::Matched { chat, .. } = outcome else {
            panic!("expected a match");
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        for inbox in [&inbox_ana, &inbox_ben] {
            let entries = inbox.snapshot(InboxFilter::All).await.unwrap();
            assert_eq!(entries.len(), 1, "one entry per pair, never two");
            match &entries[0] {
                ConversationEntry::Active { chat_id, .. } => assert_eq!(*chat_id, chat.id),
                other => panic!("unexpected entry: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn quick_connect_creates_one_chat_and_one_message() {
        let store = Arc::new(MemoryStore::new());
        let ana = signed_in(&store, "Ana").await;
        let ben = signed_in(&store, "Ben").await;

        let (chat, _msg) = ana
            .quick_connect(ben.session().user_id, "👋 Hi! I'd love to chat!")
            .await
            .unwrap();
        // repeating lands in the same chat
        let (chat2, _msg) = ana
            .quick_connect(ben.session().user_id, "me again")
            .await
            .unwrap();
        assert_eq!(chat.id, chat2.id);

        let messages = store.messages_for_chat(chat.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "👋 Hi! I'd love to chat!");
    }

    #[tokio::test]
    async fn full_conversation_round_trip() {
        let store = Arc::new(MemoryStore::new());
        let ana = signed_in(&store, "Ana").await;
        let ben = signed_in(&store, "Ben").await;

        let (chat, _) = ana
            .quick_connect(ben.session().user_id, "Hi Ben!")
            .await
            .unwrap();

        // Ben opens the chat: inbound marked read, history visible
        let ben_chat = ben.open_chat(chat.id).await.unwrap();
        assert_eq!(ben_chat.unread(), 0);
        assert_eq!(ben_chat.messages().len(), 1);

        let ana_chat = ana.open_chat(chat.id).await.unwrap();
        ben_chat.send("Hi Ana!", MessageKind::Text, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let seen = ana_chat.messages();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].content, "Hi Ana!");
        assert_eq!(seen[1].delivery, Delivery::Sent);

        ana_chat.close().await;
        ben_chat.close().await;
    }

    #[tokio::test]
    async fn sign_out_records_logout() {
        let store = Arc::new(MemoryStore::new());
        let auth = StaticAuth::signed_in(Session::new(Uuid::new_v4()));
        let client = LumoClient::sign_in(
            &auth,
            store.clone() as Arc<dyn Store>,
            AppConfig::default(),
        )
        .await
        .unwrap();
        client.complete_signup(input("Ana")).await.unwrap();
        let user_id = client.session().user_id;

        client.sign_out(&auth).await.unwrap();

        assert!(auth.current_session().is_none());
        let profile = store.get_profile(user_id).await.unwrap().unwrap();
        assert!(profile.last_logout_at.is_some());
        assert_eq!(profile.session_expires_at, None);
    }
}
