use chrono::{Duration, Utc};
use uuid::Uuid;

use lumo_shared::{AppError, AppResult, ErrorCode, Session};
use lumo_store::{Profile, ProfilePatch, Store};

/// Stamps the profile with a fresh login: `last_login_at = now`,
/// `session_expires_at = now + ttl`.  Presence derives from these fields.
pub async fn record_login(
    store: &dyn Store,
    session: &Session,
    ttl: Duration,
) -> AppResult<Profile> {
    let now = Utc::now();
    let profile = store
        .update_profile(
            session.user_id,
            ProfilePatch {
                last_login_at: Some(now),
                session_expires_at: Some(Some(now + ttl)),
                ..Default::default()
            },
        )
        .await?;

    tracing::debug!(user_id = %session.user_id, "login recorded");
    Ok(profile)
}

/// Stamps the profile with a logout: `last_logout_at = now` and the
/// session expiry cleared.
pub async fn record_logout(store: &dyn Store, session: &Session) -> AppResult<Profile> {
    let profile = store
        .update_profile(
            session.user_id,
            ProfilePatch {
                last_logout_at: Some(Utc::now()),
                session_expires_at: Some(None),
                ..Default::default()
            },
        )
        .await?;

    tracing::debug!(user_id = %session.user_id, "logout recorded");
    Ok(profile)
}

/// Loads a profile, mapping absence to `ProfileNotFound`.
pub async fn fetch_profile(store: &dyn Store, id: Uuid) -> AppResult<Profile> {
    store
        .get_profile(id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::ProfileNotFound, "profile not found"))
}
