use serde::Deserialize;
use validator::Validate;

use lumo_shared::{AppError, AppResult, Session};
use lumo_store::{NewProfile, Profile, Store};

/// Signup payload collected by the profile-setup flow.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProfileInput {
    #[validate(length(min = 2, max = 50, message = "name must be 2-50 characters"))]
    pub full_name: String,
    #[validate(range(min = 18, max = 120, message = "must be at least 18"))]
    pub age: i32,
    #[validate(length(min = 1, message = "location is required"))]
    pub location: String,
    pub bio: Option<String>,
    pub interests: Vec<String>,
    pub looking_for: Option<String>,
    pub selfie_url: Option<String>,
}

impl ProfileInput {
    /// Interests are persisted as one comma-joined text column.
    fn joined_interests(&self) -> Option<String> {
        let trimmed: Vec<&str> = self
            .interests
            .iter()
            .map(|i| i.trim())
            .filter(|i| !i.is_empty())
            .collect();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.join(","))
        }
    }
}

/// Creates the signed-in user's profile row from the signup payload.
/// The row id is the session's user id.
pub async fn complete_signup(
    store: &dyn Store,
    session: &Session,
    input: ProfileInput,
) -> AppResult<Profile> {
    input
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let interests = input.joined_interests();
    let profile = store
        .create_profile(NewProfile {
            id: session.user_id,
            full_name: input.full_name,
            age: Some(input.age),
            location: Some(input.location),
            bio: input.bio,
            interests,
            looking_for: input.looking_for,
            selfie_url: input.selfie_url,
        })
        .await?;

    tracing::info!(profile_id = %profile.id, "profile created");
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumo_store::MemoryStore;
    use uuid::Uuid;

    fn input(name: &str, age: i32) -> ProfileInput {
        ProfileInput {
            full_name: name.into(),
            age,
            location: "Paris, France".into(),
            bio: None,
            interests: vec!["hiking".into(), " jazz ".into(), "".into()],
            looking_for: Some("long-term".into()),
            selfie_url: None,
        }
    }

    #[tokio::test]
    async fn signup_creates_profile_with_joined_interests() {
        let store = MemoryStore::new();
        let session = Session::new(Uuid::new_v4());

        let profile = complete_signup(&store, &session, input("Sophia", 24))
            .await
            .unwrap();

        assert_eq!(profile.id, session.user_id);
        assert_eq!(profile.interests.as_deref(), Some("hiking,jazz"));
    }

    #[tokio::test]
    async fn underage_signup_is_rejected() {
        let store = MemoryStore::new();
        let session = Session::new(Uuid::new_v4());

        let err = complete_signup(&store, &session, input("Sophia", 17))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let store = MemoryStore::new();
        let session = Session::new(Uuid::new_v4());

        let err = complete_signup(&store, &session, input("S", 24))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
