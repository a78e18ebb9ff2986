use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- PairKey ---

/// Normalized unordered pair of user ids.
///
/// Matches and chats are identified by the pair of participants, not by the
/// direction of who acted first; normalizing (smaller id first) gives every
/// pair exactly one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    a: Uuid,
    b: Uuid,
}

impl PairKey {
    pub fn new(x: Uuid, y: Uuid) -> Self {
        if x <= y {
            Self { a: x, b: y }
        } else {
            Self { a: y, b: x }
        }
    }

    pub fn users(&self) -> (Uuid, Uuid) {
        (self.a, self.b)
    }

    pub fn contains(&self, user_id: Uuid) -> bool {
        self.a == user_id || self.b == user_id
    }

    /// The other member of the pair, if `user_id` is a member at all.
    pub fn other(&self, user_id: Uuid) -> Option<Uuid> {
        if self.a == user_id {
            Some(self.b)
        } else if self.b == user_id {
            Some(self.a)
        } else {
            None
        }
    }
}

// --- Profile ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: String,
    pub age: Option<i32>,
    pub location: Option<String>,
    pub bio: Option<String>,
    /// Comma-joined free-text interest list ("hiking,jazz,coffee").
    pub interests: Option<String>,
    pub looking_for: Option<String>,
    pub selfie_url: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_logout_at: Option<DateTime<Utc>>,
    pub session_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn interest_list(&self) -> Vec<&str> {
        self.interests
            .as_deref()
            .map(|s| s.split(',').map(str::trim).filter(|i| !i.is_empty()).collect())
            .unwrap_or_default()
    }
}

/// Insert payload for `profiles`. The id is the auth user id, so a profile
/// row and its owning account share an identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProfile {
    pub id: Uuid,
    pub full_name: String,
    pub age: Option<i32>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub interests: Option<String>,
    pub looking_for: Option<String>,
    pub selfie_url: Option<String>,
}

/// Partial update for `profiles`. `None` leaves a column untouched;
/// for `session_expires_at`, `Some(None)` clears the column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfilePatch {
    pub full_name: Option<String>,
    pub age: Option<i32>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub interests: Option<String>,
    pub looking_for: Option<String>,
    pub selfie_url: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_logout_at: Option<DateTime<Utc>>,
    pub session_expires_at: Option<Option<DateTime<Utc>>>,
}

// --- Like ---

/// Directed like edge. At most one live edge per ordered (liker, liked) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like {
    pub id: Uuid,
    pub liker_id: Uuid,
    pub liked_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLike {
    pub liker_id: Uuid,
    pub liked_id: Uuid,
}

// --- Match ---

/// Undirected pairing written when reciprocal likes are detected.
/// Kept as an audit/history record; never mutated, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: Uuid,
    pub user_a: Uuid,
    pub user_b: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Match {
    pub fn pair(&self) -> PairKey {
        PairKey::new(self.user_a, self.user_b)
    }
}

// --- Chat ---

/// Undirected conversation container. At most one chat per unordered pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: Uuid,
    pub user_a: Uuid,
    pub user_b: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Chat {
    pub fn pair(&self) -> PairKey {
        PairKey::new(self.user_a, self.user_b)
    }
}

// --- Message ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    Voice,
}

/// Server-side delivery status. The transient client-side states
/// (sending, failed) never reach the store; see the messaging pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Read,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub kind: MessageKind,
    pub media_url: Option<String>,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub kind: MessageKind,
    pub media_url: Option<String>,
}
