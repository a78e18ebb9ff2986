use serde::{Deserialize, Serialize};

/// Application error codes following the pattern E{domain}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Session errors
/// - E2xxx: Profile errors
/// - E3xxx: Matching errors
/// - E4xxx: Messaging errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    BadRequest,
    StoreUnavailable,

    // Session (E1xxx)
    NotAuthenticated,
    EmailNotConfirmed,
    SessionExpired,

    // Profile (E2xxx)
    ProfileNotFound,
    ProfileAlreadyExists,

    // Matching (E3xxx)
    CannotLikeSelf,
    LikeNotFound,
    MatchNotFound,

    // Messaging (E4xxx)
    ChatNotFound,
    NotChatMember,
    MessageNotFound,
    EmptyMessage,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::BadRequest => "E0004",
            Self::StoreUnavailable => "E0005",

            // Session
            Self::NotAuthenticated => "E1001",
            Self::EmailNotConfirmed => "E1002",
            Self::SessionExpired => "E1003",

            // Profile
            Self::ProfileNotFound => "E2001",
            Self::ProfileAlreadyExists => "E2002",

            // Matching
            Self::CannotLikeSelf => "E3001",
            Self::LikeNotFound => "E3002",
            Self::MatchNotFound => "E3003",

            // Messaging
            Self::ChatNotFound => "E4001",
            Self::NotChatMember => "E4002",
            Self::MessageNotFound => "E4003",
            Self::EmptyMessage => "E4004",
        }
    }
}

/// Errors crossing the relational store adapter boundary.
///
/// A create-if-absent race is not represented here: the adapter contract
/// requires returning the existing row, so conflicts are absorbed before
/// they can surface.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("{0} not found")]
    NotFound(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal error")]
    Internal(#[from] anyhow::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("validation error: {0}")]
    Validation(String),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn not_authenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotAuthenticated, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Stable error code string for logging and client display.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Known { code, .. } => code.code(),
            Self::Internal(_) => ErrorCode::InternalError.code(),
            Self::Store(StoreError::Unavailable(_)) => ErrorCode::StoreUnavailable.code(),
            Self::Store(StoreError::NotFound(_)) => ErrorCode::NotFound.code(),
            Self::Validation(_) => ErrorCode::ValidationError.code(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_ranges_are_stable() {
        assert_eq!(ErrorCode::InternalError.code(), "E0001");
        assert_eq!(ErrorCode::NotAuthenticated.code(), "E1001");
        assert_eq!(ErrorCode::ProfileNotFound.code(), "E2001");
        assert_eq!(ErrorCode::CannotLikeSelf.code(), "E3001");
        assert_eq!(ErrorCode::ChatNotFound.code(), "E4001");
    }

    #[test]
    fn store_errors_map_to_shared_codes() {
        let err = AppError::from(StoreError::Unavailable("connection refused".into()));
        assert_eq!(err.code(), "E0005");

        let err = AppError::from(StoreError::NotFound("chat"));
        assert_eq!(err.code(), "E0003");
    }
}
