use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Session, UserProfile};

/// User record file name in the session directory
const USER_FILE: &str = "user.json";

/// Access token file name in the session directory
const TOKEN_FILE: &str = "access_token";

/// On-disk shape of the user record: the backend's user object plus the
/// moment this process signed in, so a restored session keeps its age.
#[derive(Debug, Serialize, Deserialize)]
struct StoredUser {
    #[serde(flatten)]
    user: UserProfile,
    signed_in_at: chrono::DateTime<chrono::Utc>,
}

/// Durable, synchronous storage for the single current session.
///
/// The user record and access token live under two stable keys in one
/// directory, shared by every companion and game process of the same OS
/// user. `read` never fails: a missing or unparseable half means anonymous.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Current session, or `None` for anonymous.
    ///
    /// A stored user without a token (or vice versa), or corrupt data under
    /// either key, is treated as anonymous rather than surfaced as an error.
    pub fn read(&self) -> Option<Session> {
        let user_raw = match std::fs::read_to_string(self.user_path()) {
            Ok(contents) => contents,
            Err(_) => return None,
        };
        let token = match std::fs::read_to_string(self.token_path()) {
            Ok(contents) => contents,
            Err(_) => {
                debug!("stored user without access token, treating as anonymous");
                return None;
            }
        };
        let token = token.trim();
        if token.is_empty() {
            debug!("stored access token is empty, treating as anonymous");
            return None;
        }

        match serde_json::from_str::<StoredUser>(&user_raw) {
            Ok(stored) => Some(Session {
                user: stored.user,
                access_token: token.to_string(),
                signed_in_at: stored.signed_in_at,
            }),
            Err(e) => {
                debug!(error = %e, "corrupt user record, treating as anonymous");
                None
            }
        }
    }

    /// Persist the full session, replacing any prior value.
    pub fn write(&self, session: &Session) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create session directory {}", self.dir.display()))?;

        let stored = StoredUser {
            user: session.user.clone(),
            signed_in_at: session.signed_in_at,
        };
        let contents = serde_json::to_string_pretty(&stored)?;

        // Token first: a crash between the two writes leaves a token without
        // a user record, which read() coerces to anonymous.
        std::fs::write(self.token_path(), &session.access_token)
            .context("Failed to write access token")?;
        std::fs::write(self.user_path(), contents).context("Failed to write user record")?;
        Ok(())
    }

    /// Remove the persisted session entirely.
    pub fn clear(&self) -> Result<()> {
        for path in [self.user_path(), self.token_path()] {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    return Err(e).with_context(|| format!("Failed to remove {}", path.display()));
                }
            }
        }
        Ok(())
    }

    fn user_path(&self) -> PathBuf {
        self.dir.join(USER_FILE)
    }

    fn token_path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session() -> Session {
        Session::new(
            UserProfile {
                id: 1,
                name: "Amelia".to_string(),
                email: "amelia@example.com".to_string(),
                picture: Some("https://example.com/p.png".to_string()),
                stars: 42,
                level: 5,
                created_at: None,
                last_login: None,
            },
            "tok1".to_string(),
        )
    }

    #[test]
    fn test_read_after_write_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path().to_path_buf());

        let session = sample_session();
        store.write(&session).expect("write session");

        let read = store.read().expect("session present");
        assert_eq!(read, session);
    }

    #[test]
    fn test_read_empty_dir_is_anonymous() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path().join("never-created"));
        assert!(store.read().is_none());
    }

    #[test]
    fn test_clear_always_leaves_anonymous() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path().to_path_buf());

        // Clearing with nothing stored is fine
        store.clear().expect("clear empty store");
        assert!(store.read().is_none());

        store.write(&sample_session()).expect("write session");
        store.clear().expect("clear stored session");
        assert!(store.read().is_none());
    }

    #[test]
    fn test_write_replaces_prior_session() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path().to_path_buf());

        let first = sample_session();
        store.write(&first).expect("write first");

        let mut renamed = first.user.clone();
        renamed.name = "Amy".to_string();
        let second = first.with_user(renamed);
        store.write(&second).expect("write second");

        let read = store.read().expect("session present");
        assert_eq!(read.user.name, "Amy");
        assert_eq!(read.access_token, "tok1");
    }

    #[test]
    fn test_user_without_token_is_anonymous() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path().to_path_buf());

        store.write(&sample_session()).expect("write session");
        std::fs::remove_file(dir.path().join(TOKEN_FILE)).expect("drop token");
        assert!(store.read().is_none());
    }

    #[test]
    fn test_token_without_user_is_anonymous() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path().to_path_buf());

        store.write(&sample_session()).expect("write session");
        std::fs::remove_file(dir.path().join(USER_FILE)).expect("drop user");
        assert!(store.read().is_none());
    }

    #[test]
    fn test_corrupt_user_record_is_anonymous() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path().to_path_buf());

        store.write(&sample_session()).expect("write session");
        std::fs::write(dir.path().join(USER_FILE), "{not valid json").expect("corrupt user");
        assert!(store.read().is_none());
    }
}
