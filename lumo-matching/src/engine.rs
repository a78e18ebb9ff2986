use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use lumo_profiles::fetch_profile;
use lumo_shared::{AppError, AppResult, ErrorCode, Session};
use lumo_store::{Chat, Like, Match, NewLike, PairKey, Profile, Store};

/// Result of submitting a like.
#[derive(Debug, Clone, Serialize)]
pub enum LikeOutcome {
    /// Edge recorded, no reciprocal like yet.
    Liked(Like),
    /// Reciprocal like found: the pair is matched and a chat is provisioned.
    /// The chat handle lets the caller move straight into messaging.
    Matched {
        like: Like,
        matched: Match,
        chat: Chat,
    },
}

/// One row of the likes-received overview.
#[derive(Debug, Clone, Serialize)]
pub struct LikeEntry {
    pub profile: Profile,
    pub liked_at: DateTime<Utc>,
    /// Whether the signed-in user has liked this person back.
    pub mutual: bool,
}

/// Decides when two users become a match and provisions the chat for them.
///
/// All writes go through the store's create-if-absent operations, so
/// repeated or concurrent submissions of the same like converge on a single
/// edge, a single match row, and a single chat per pair.
pub struct LikeEngine {
    store: Arc<dyn Store>,
    session: Session,
}

impl LikeEngine {
    pub fn new(store: Arc<dyn Store>, session: Session) -> Self {
        Self { store, session }
    }

    fn me(&self) -> Uuid {
        self.session.user_id
    }

    /// Records a directed like from the signed-in user to `receiver`.
    ///
    /// If the reverse edge already exists the pair is promoted: a match row
    /// is written (audit history) and a chat is ensured, both idempotently.
    /// On store failure nothing is reported as recorded.
    pub async fn submit_like(&self, receiver: Uuid) -> AppResult<LikeOutcome> {
        if receiver == self.me() {
            return Err(AppError::new(
                ErrorCode::CannotLikeSelf,
                "cannot like your own profile",
            ));
        }

        // Both profiles must exist before an edge between them can.
        fetch_profile(self.store.as_ref(), self.me()).await?;
        fetch_profile(self.store.as_ref(), receiver).await?;

        let like = self
            .store
            .create_like(NewLike {
                liker_id: self.me(),
                liked_id: receiver,
            })
            .await?;

        let reverse = self.store.find_like(receiver, self.me()).await?;
        if reverse.is_none() {
            tracing::debug!(liker = %self.me(), liked = %receiver, "like recorded, no match yet");
            return Ok(LikeOutcome::Liked(like));
        }

        let matched = self.store.create_match(self.me(), receiver).await?;
        let chat = self.ensure_chat(receiver).await?;

        tracing::info!(
            match_id = %matched.id,
            chat_id = %chat.id,
            user_a = %matched.user_a,
            user_b = %matched.user_b,
            "reciprocal like, pair matched"
        );

        Ok(LikeOutcome::Matched { like, matched, chat })
    }

    /// Removes the signed-in user's like of `receiver`.  An existing match
    /// or chat for the pair is left untouched; matching is a one-way
    /// ratchet.  Returns whether an edge existed.
    pub async fn unlike(&self, receiver: Uuid) -> AppResult<bool> {
        let removed = self.store.remove_like(self.me(), receiver).await?;
        if removed {
            tracing::debug!(liker = %self.me(), liked = %receiver, "like removed");
        }
        Ok(removed)
    }

    /// Find-existing-or-create the chat for the signed-in user and `other`.
    pub async fn ensure_chat(&self, other: Uuid) -> AppResult<Chat> {
        let pair = PairKey::new(self.me(), other);
        if let Some(existing) = self.store.find_chat(pair).await? {
            return Ok(existing);
        }
        Ok(self.store.create_chat(self.me(), other).await?)
    }

    /// Likes received by the signed-in user, newest first, each annotated
    /// with whether it is mutual.  Backs the All/Mutual/New buckets of the
    /// likes screen.
    pub async fn likes_overview(&self) -> AppResult<Vec<LikeEntry>> {
        let received = self.store.likes_received(self.me()).await?;

        let mut entries = Vec::with_capacity(received.len());
        for like in received {
            let profile = match self.store.get_profile(like.liker_id).await? {
                Some(p) => p,
                None => {
                    // liker's profile vanished; skip rather than fail the view
                    tracing::warn!(liker = %like.liker_id, "like without profile, skipping");
                    continue;
                }
            };
            let mutual = self
                .store
                .find_like(self.me(), like.liker_id)
                .await?
                .is_some();
            entries.push(LikeEntry {
                profile,
                liked_at: like.created_at,
                mutual,
            });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumo_store::{MemoryStore, NewProfile};

    async fn seed(store: &MemoryStore, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        store
            .create_profile(NewProfile {
                id,
                full_name: name.into(),
                age: Some(25),
                location: Some("Paris, France".into()),
                bio: None,
                interests: None,
                looking_for: None,
                selfie_url: None,
            })
            .await
            .unwrap();
        id
    }

    fn engine(store: &Arc<MemoryStore>, user: Uuid) -> LikeEngine {
        LikeEngine::new(store.clone(), Session::new(user))
    }

    #[tokio::test]
    async fn one_sided_like_is_not_a_match() {
        let store = Arc::new(MemoryStore::new());
        let a = seed(&store, "Ana").await;
        let b = seed(&store, "Ben").await;

        let outcome = engine(&store, a).submit_like(b).await.unwrap();
        assert!(matches!(outcome, LikeOutcome::Liked(_)));
        assert!(store.matches_for(a).await.unwrap().is_empty());
        assert!(store.chats_for(a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reciprocal_likes_yield_one_match_and_one_chat() {
        let store = Arc::new(MemoryStore::new());
        let a = seed(&store, "Ana").await;
        let b = seed(&store, "Ben").await;

        engine(&store, a).submit_like(b).await.unwrap();
        let outcome = engine(&store, b).submit_like(a).await.unwrap();

        let LikeOutcome::Matched { matched, chat, .. } = outcome else {
            panic!("expected a match");
        };
        assert_eq!(matched.pair(), PairKey::new(a, b));
        assert_eq!(chat.pair(), PairKey::new(a, b));

        // repetition from either side changes nothing
        engine(&store, a).submit_like(b).await.unwrap();
        engine(&store, b).submit_like(a).await.unwrap();
        assert_eq!(store.matches_for(a).await.unwrap().len(), 1);
        assert_eq!(store.chats_for(a).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn double_like_creates_one_edge() {
        let store = Arc::new(MemoryStore::new());
        let a = seed(&store, "Ana").await;
        let b = seed(&store, "Ben").await;

        let eng = engine(&store, a);
        eng.submit_like(b).await.unwrap();
        eng.submit_like(b).await.unwrap();

        assert_eq!(store.likes_sent(a).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn self_like_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let a = seed(&store, "Ana").await;

        let err = engine(&store, a).submit_like(a).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Known { code: ErrorCode::CannotLikeSelf, .. }
        ));
    }

    #[tokio::test]
    async fn like_of_unknown_profile_fails() {
        let store = Arc::new(MemoryStore::new());
        let a = seed(&store, "Ana").await;

        let err = engine(&store, a).submit_like(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Known { code: ErrorCode::ProfileNotFound, .. }
        ));
    }

    #[tokio::test]
    async fn outage_surfaces_and_records_nothing() {
        let store = Arc::new(MemoryStore::new());
        let a = seed(&store, "Ana").await;
        let b = seed(&store, "Ben").await;

        store.set_offline(true);
        let err = engine(&store, a).submit_like(b).await.unwrap_err();
        assert!(matches!(err, AppError::Store(_)));

        store.set_offline(false);
        assert!(store.likes_sent(a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unlike_never_retracts_a_match() {
        let store = Arc::new(MemoryStore::new());
        let a = seed(&store, "Ana").await;
        let b = seed(&store, "Ben").await;

        engine(&store, a).submit_like(b).await.unwrap();
        engine(&store, b).submit_like(a).await.unwrap();

        assert!(engine(&store, a).unlike(b).await.unwrap());
        assert_eq!(store.matches_for(a).await.unwrap().len(), 1);
        assert_eq!(store.chats_for(a).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn likes_overview_flags_mutuals() {
        let store = Arc::new(MemoryStore::new());
        let a = seed(&store, "Ana").await;
        let b = seed(&store, "Ben").await;
        let c = seed(&store, "Cleo").await;

        engine(&store, b).submit_like(a).await.unwrap();
        engine(&store, c).submit_like(a).await.unwrap();
        engine(&store, a).submit_like(b).await.unwrap();

        let overview = engine(&store, a).likes_overview().await.unwrap();
        assert_eq!(overview.len(), 2);
        let mutual_of = |id: Uuid| overview.iter().find(|e| e.profile.id == id).unwrap().mutual;
        assert!(mutual_of(b));
        assert!(!mutual_of(c));
    }
}
