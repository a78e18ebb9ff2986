use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use lumo_store::Profile;

/// Whether the profile's owner counts as online at `now`.
///
/// Online iff a login is recorded, no logout is recorded after it, and the
/// session (if it carries an expiry) has not expired.  Pure function over
/// possibly-absent timestamps; cheap enough to re-evaluate on every poll.
pub fn is_online(profile: &Profile, now: DateTime<Utc>) -> bool {
    let Some(login) = profile.last_login_at else {
        return false;
    };
    if let Some(logout) = profile.last_logout_at {
        if login <= logout {
            return false;
        }
    }
    if let Some(expiry) = profile.session_expires_at {
        if expiry <= now {
            return false;
        }
    }
    true
}

/// Coarse last-activity bucket for display next to a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LastActive {
    OnlineNow,
    Minutes(i64),
    Hours(i64),
    Days(i64),
    Unknown,
}

/// Buckets the profile's most recent activity timestamp
/// (`max(last_login_at, last_logout_at)`) relative to `now`.
pub fn last_active(profile: &Profile, now: DateTime<Utc>) -> LastActive {
    if is_online(profile, now) {
        return LastActive::OnlineNow;
    }

    let last = match (profile.last_login_at, profile.last_logout_at) {
        (Some(login), Some(logout)) => login.max(logout),
        (Some(login), None) => login,
        (None, Some(logout)) => logout,
        (None, None) => return LastActive::Unknown,
    };

    let elapsed = now.signed_duration_since(last);
    let minutes = elapsed.num_minutes();
    if minutes < 60 {
        LastActive::Minutes(minutes.max(1))
    } else if elapsed.num_hours() < 24 {
        LastActive::Hours(elapsed.num_hours())
    } else {
        LastActive::Days(elapsed.num_days())
    }
}

impl fmt::Display for LastActive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnlineNow => write!(f, "Online now"),
            Self::Minutes(n) => write!(f, "{n} min ago"),
            Self::Hours(1) => write!(f, "1 hour ago"),
            Self::Hours(n) => write!(f, "{n} hours ago"),
            Self::Days(1) => write!(f, "1 day ago"),
            Self::Days(n) => write!(f, "{n} days ago"),
            Self::Unknown => write!(f, "Offline"),
        }
    }
}
