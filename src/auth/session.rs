use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User record as issued by the account backend.
///
/// Everything beyond `id` and `name` is opaque to the session layer and is
/// carried through for display only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub stars: i64,
    #[serde(default = "default_level")]
    pub level: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

fn default_level() -> i64 {
    1
}

/// The authenticated identity and credential pair.
///
/// Absence of a `Session` means anonymous - a valid state, not an error.
/// The user record and token are only ever written or cleared together;
/// see `SessionStore`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user: UserProfile,
    pub access_token: String,
    pub signed_in_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user: UserProfile, access_token: String) -> Self {
        Self {
            user,
            access_token,
            signed_in_at: Utc::now(),
        }
    }

    /// Replace the user record wholesale, keeping the same token.
    /// Used after the backend confirms a profile edit.
    pub fn with_user(&self, user: UserProfile) -> Self {
        Self {
            user,
            access_token: self.access_token.clone(),
            signed_in_at: self.signed_in_at,
        }
    }

    /// Compare the fields the change poller diffs on.
    ///
    /// Timestamps are excluded so a rewritten-but-identical session does not
    /// fan out a notification from the poller (redundant notifications are
    /// permitted, but there is no reason to schedule them).
    pub fn same_identity(&self, other: &Self) -> bool {
        self.access_token == other.access_token
            && self.user.id == other.user.id
            && self.user.name == other.user.name
            && self.user.picture == other.user.picture
            && self.user.stars == other.user.stars
            && self.user.level == other.user.level
    }
}
