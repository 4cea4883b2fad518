//! Session change fan-out.
//!
//! Every UI surface (and every other running companion or game process)
//! must converge on the session persisted by `SessionStore`. Two producers
//! feed one subscriber channel:
//!
//! - local mutations go through `write`/`clear` here, which persist and then
//!   immediately dispatch a synthetic notification - the store itself has no
//!   side channel, so a same-process write would otherwise go unnoticed;
//! - a background task polls the store and dispatches whenever the persisted
//!   value differs from the last one observed, which is how writes made by
//!   other processes (or any missed notification) are picked up.
//!
//! Subscribers receive the full `Option<Session>` and are expected to
//! re-render unconditionally; redundant notifications with an unchanged
//! value are allowed.

// Allow dead code: subscription methods beyond what the TUI loop uses
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

use super::{Session, SessionStore};

/// How often the fallback poller re-reads the store.
/// 500ms keeps cross-process convergence comfortably under a second without
/// noticeable disk traffic for two small files.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    senders: HashMap<u64, UnboundedSender<Option<Session>>>,
}

struct Shared {
    store: SessionStore,
    subscribers: Mutex<Subscribers>,
    /// Last value dispatched (or observed at startup); the poller diffs
    /// against this by identity fields.
    last_seen: Mutex<Option<Session>>,
}

impl Shared {
    fn dispatch(&self, session: Option<Session>) {
        let mut subs = self.subscribers.lock().expect("subscriber lock poisoned");
        // Senders whose receiver is gone are pruned here as a backstop;
        // SessionWatch::drop normally unregisters them first.
        subs.senders
            .retain(|_, tx| tx.send(session.clone()).is_ok());
    }

    /// Re-read the store and notify if it no longer matches what was last
    /// observed. Returns true if a change was dispatched.
    fn poll_once(&self) -> bool {
        let current = self.store.read();
        let mut last = self.last_seen.lock().expect("last_seen lock poisoned");
        let changed = match (&current, &*last) {
            (Some(a), Some(b)) => !a.same_identity(b),
            (None, None) => false,
            _ => true,
        };
        if changed {
            debug!(
                authenticated = current.is_some(),
                "session changed outside this process"
            );
            *last = current.clone();
            drop(last);
            self.dispatch(current);
        }
        changed
    }
}

/// Hands out subscriptions and keeps them fed.
///
/// Cheap to clone; all clones share one subscriber registry and one poller.
/// The poller stops when the last clone is dropped.
#[derive(Clone)]
pub struct SessionBroadcaster {
    shared: Arc<Shared>,
}

impl SessionBroadcaster {
    pub fn new(store: SessionStore) -> Self {
        Self::with_poll_interval(store, POLL_INTERVAL)
    }

    /// Interval is injectable so tests do not wait out the real 500ms.
    pub fn with_poll_interval(store: SessionStore, interval: Duration) -> Self {
        let shared = Arc::new(Shared {
            last_seen: Mutex::new(store.read()),
            store,
            subscribers: Mutex::new(Subscribers::default()),
        });

        let weak: Weak<Shared> = Arc::downgrade(&shared);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(shared) => {
                        shared.poll_once();
                    }
                    None => {
                        debug!("session broadcaster dropped, stopping poller");
                        break;
                    }
                }
            }
        });

        Self { shared }
    }

    /// Current persisted session, straight from the store.
    pub fn read(&self) -> Option<Session> {
        self.shared.store.read()
    }

    /// Persist a new session and notify every subscriber.
    pub fn write(&self, session: Session) -> Result<()> {
        self.shared.store.write(&session)?;
        info!(user = %session.user.name, "session written");
        *self.shared.last_seen.lock().expect("last_seen lock poisoned") = Some(session.clone());
        self.shared.dispatch(Some(session));
        Ok(())
    }

    /// Remove the persisted session and notify every subscriber.
    pub fn clear(&self) -> Result<()> {
        self.shared.store.clear()?;
        info!("session cleared");
        *self.shared.last_seen.lock().expect("last_seen lock poisoned") = None;
        self.shared.dispatch(None);
        Ok(())
    }

    pub fn subscribe(&self) -> SessionWatch {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subs = self
            .shared
            .subscribers
            .lock()
            .expect("subscriber lock poisoned");
        let id = subs.next_id;
        subs.next_id += 1;
        subs.senders.insert(id, tx);
        SessionWatch {
            id,
            rx,
            shared: Arc::downgrade(&self.shared),
        }
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.shared
            .subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .senders
            .len()
    }
}

/// One consumer's subscription. Dropping it unsubscribes, so a surface that
/// unmounts stops receiving (and stops retaining) notifications.
pub struct SessionWatch {
    id: u64,
    rx: UnboundedReceiver<Option<Session>>,
    shared: Weak<Shared>,
}

impl SessionWatch {
    /// Wait for the next notification. `None` means the broadcaster is gone.
    pub async fn changed(&mut self) -> Option<Option<Session>> {
        self.rx.recv().await
    }

    /// Drain without waiting; used from the UI loop between input polls.
    /// Returns the most recent pending value, if any.
    pub fn latest_pending(&mut self) -> Option<Option<Session>> {
        let mut latest = None;
        while let Ok(session) = self.rx.try_recv() {
            latest = Some(session);
        }
        latest
    }
}

impl Drop for SessionWatch {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            let mut subs = shared.subscribers.lock().expect("subscriber lock poisoned");
            subs.senders.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserProfile;
    use tokio::time::timeout;

    /// Generous upper bound for poll-driven delivery in tests
    const DELIVERY_TIMEOUT: Duration = Duration::from_secs(2);

    fn session(name: &str, token: &str) -> Session {
        Session::new(
            UserProfile {
                id: 1,
                name: name.to_string(),
                email: "amelia@example.com".to_string(),
                picture: None,
                stars: 0,
                level: 1,
                created_at: None,
                last_login: None,
            },
            token.to_string(),
        )
    }

    #[tokio::test]
    async fn test_local_write_notifies_subscriber() {
        let dir = tempfile::tempdir().expect("tempdir");
        let broadcaster =
            SessionBroadcaster::with_poll_interval(SessionStore::new(dir.path().to_path_buf()), Duration::from_secs(60));
        let mut watch = broadcaster.subscribe();

        let s = session("Amelia", "tok1");
        broadcaster.write(s.clone()).expect("write");

        let notified = timeout(DELIVERY_TIMEOUT, watch.changed())
            .await
            .expect("notification in time")
            .expect("broadcaster alive");
        assert_eq!(notified, Some(s));
    }

    #[tokio::test]
    async fn test_clear_notifies_with_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let broadcaster =
            SessionBroadcaster::with_poll_interval(SessionStore::new(dir.path().to_path_buf()), Duration::from_secs(60));
        broadcaster.write(session("Amelia", "tok1")).expect("write");

        let mut watch = broadcaster.subscribe();
        broadcaster.clear().expect("clear");

        let notified = timeout(DELIVERY_TIMEOUT, watch.changed())
            .await
            .expect("notification in time")
            .expect("broadcaster alive");
        assert_eq!(notified, None);
        assert!(broadcaster.read().is_none());
    }

    #[tokio::test]
    async fn test_poller_picks_up_external_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path().to_path_buf());
        let broadcaster =
            SessionBroadcaster::with_poll_interval(store.clone(), Duration::from_millis(10));
        let mut watch = broadcaster.subscribe();

        // Another process writing the same storage: only the poller can see it
        let s = session("Amelia", "tok1");
        store.write(&s).expect("external write");

        let notified = timeout(DELIVERY_TIMEOUT, watch.changed())
            .await
            .expect("poll-detected change in time")
            .expect("broadcaster alive");
        assert_eq!(notified, Some(s));
    }

    #[tokio::test]
    async fn test_two_subscribers_converge() {
        let dir = tempfile::tempdir().expect("tempdir");
        let broadcaster =
            SessionBroadcaster::with_poll_interval(SessionStore::new(dir.path().to_path_buf()), Duration::from_secs(60));
        let mut a = broadcaster.subscribe();
        let mut b = broadcaster.subscribe();

        broadcaster.write(session("Amelia", "tok1")).expect("write 1");
        let final_session = session("Amy", "tok2");
        broadcaster.write(final_session.clone()).expect("write 2");

        // Both observe some interleaving, but the last value matches
        let last_a = a.latest_pending().expect("a saw changes");
        let last_b = b.latest_pending().expect("b saw changes");
        assert_eq!(last_a, Some(final_session.clone()));
        assert_eq!(last_a, last_b);
    }

    #[tokio::test]
    async fn test_dropping_watch_unsubscribes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let broadcaster =
            SessionBroadcaster::with_poll_interval(SessionStore::new(dir.path().to_path_buf()), Duration::from_secs(60));

        let watch = broadcaster.subscribe();
        let other = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 2);

        drop(watch);
        assert_eq!(broadcaster.subscriber_count(), 1);
        drop(other);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_unchanged_store_does_not_notify() {
        let dir = tempfile::tempdir().expect("tempdir");
        let broadcaster = SessionBroadcaster::with_poll_interval(
            SessionStore::new(dir.path().to_path_buf()),
            Duration::from_millis(10),
        );
        broadcaster.write(session("Amelia", "tok1")).expect("write");

        let mut watch = broadcaster.subscribe();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(watch.latest_pending().is_none());
    }
}
