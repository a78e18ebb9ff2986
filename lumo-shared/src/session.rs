use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Explicit session context for the signed-in user.
///
/// Created once at successful authentication and passed into every
/// component that acts on the user's behalf; torn down at sign-out.
/// Nothing below this layer re-fetches "who is logged in".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    pub email_confirmed: bool,
}

impl Session {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            email_confirmed: true,
        }
    }

    pub fn unconfirmed(user_id: Uuid) -> Self {
        Self {
            user_id,
            email_confirmed: false,
        }
    }
}

/// External authentication collaborator.
///
/// The real implementation wraps the backing platform's auth service; this
/// layer only ever needs the current session identity out of it.
pub trait AuthProvider: Send + Sync {
    fn current_session(&self) -> Option<Session>;

    fn sign_out(&self);
}

/// In-process [`AuthProvider`] holding a fixed session, for tests and
/// embedding scenarios where authentication happened elsewhere.
pub struct StaticAuth {
    session: Mutex<Option<Session>>,
}

impl StaticAuth {
    pub fn signed_in(session: Session) -> Self {
        Self {
            session: Mutex::new(Some(session)),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            session: Mutex::new(None),
        }
    }
}

impl AuthProvider for StaticAuth {
    fn current_session(&self) -> Option<Session> {
        self.session.lock().expect("auth lock poisoned").clone()
    }

    fn sign_out(&self) {
        self.session.lock().expect("auth lock poisoned").take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_auth_round_trip() {
        let session = Session::new(Uuid::new_v4());
        let auth = StaticAuth::signed_in(session.clone());

        assert_eq!(auth.current_session(), Some(session));

        auth.sign_out();
        assert_eq!(auth.current_session(), None);
    }

    #[test]
    fn signed_out_has_no_session() {
        assert!(StaticAuth::signed_out().current_session().is_none());
    }
}
