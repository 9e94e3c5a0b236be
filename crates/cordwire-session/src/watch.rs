//! Publishing session snapshots to handlers.

use std::sync::Arc;

use cordwire_protocol::Snowflake;
use tokio::sync::watch;

use crate::{SessionError, SessionSnapshot};

type Slot = Option<Arc<SessionSnapshot>>;

/// Write side, owned by the connection loop. Outlives individual sessions:
/// the same publisher announces every session the client goes through.
#[derive(Debug)]
pub struct SessionPublisher {
    tx: watch::Sender<Slot>,
}

impl SessionPublisher {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Makes `snapshot` the current session for every watcher.
    pub fn publish(&self, snapshot: Arc<SessionSnapshot>) {
        self.tx.send_replace(Some(snapshot));
    }

    pub fn watch(&self) -> SessionWatch {
        SessionWatch {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for SessionPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of the latest authenticated session.
///
/// Cheap to clone; capture one in each handler closure that needs to know
/// who the client is logged in as.
#[derive(Debug, Clone)]
pub struct SessionWatch {
    rx: watch::Receiver<Slot>,
}

impl SessionWatch {
    /// The most recent snapshot, or `None` before the first READY.
    pub fn current(&self) -> Option<Arc<SessionSnapshot>> {
        self.rx.borrow().clone()
    }

    /// Shortcut for the logged-in user's id.
    pub fn user_id(&self) -> Option<Snowflake> {
        self.rx.borrow().as_ref().map(|s| s.user_id())
    }

    pub fn is_ready(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Waits until a session has been published, returning it.
    ///
    /// # Errors
    /// Returns [`SessionError::Closed`] if the publisher is dropped first.
    pub async fn wait_ready(&mut self) -> Result<Arc<SessionSnapshot>, SessionError> {
        let slot = self
            .rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| SessionError::Closed)?;
        slot.clone().ok_or(SessionError::NotAuthenticated)
    }

    /// Waits for the next publish (a new session after a reconnect).
    ///
    /// # Errors
    /// Returns [`SessionError::Closed`] if the publisher is dropped.
    pub async fn changed(&mut self) -> Result<Option<Arc<SessionSnapshot>>, SessionError> {
        self.rx.changed().await.map_err(|_| SessionError::Closed)?;
        Ok(self.rx.borrow_and_update().clone())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cordwire_protocol::CurrentUser;

    use super::*;
    use crate::Session;

    fn snapshot(id: &str, user: u64) -> Arc<SessionSnapshot> {
        let mut s = Session::begin(Duration::from_secs(1));
        s.authenticate(
            id,
            CurrentUser {
                id: Snowflake(user),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_watch_empty_before_publish() {
        let publisher = SessionPublisher::new();
        let w = publisher.watch();
        assert!(w.current().is_none());
        assert_eq!(w.user_id(), None);
        assert!(!w.is_ready());
    }

    #[tokio::test]
    async fn test_publish_replaces_current() {
        let publisher = SessionPublisher::new();
        let w = publisher.watch();
        publisher.publish(snapshot("a", 1));
        assert_eq!(w.user_id(), Some(Snowflake(1)));

        let held = w.current().unwrap();
        publisher.publish(snapshot("b", 2));
        assert_eq!(w.current().unwrap().session_id, "b");
        // An older snapshot held by a handler is untouched.
        assert_eq!(held.session_id, "a");
    }

    #[tokio::test]
    async fn test_wait_ready_resolves_on_publish() {
        let publisher = SessionPublisher::new();
        let mut w = publisher.watch();
        let waiter = tokio::spawn(async move { w.wait_ready().await });
        tokio::task::yield_now().await;
        publisher.publish(snapshot("a", 1));
        let snap = waiter.await.unwrap().unwrap();
        assert_eq!(snap.session_id, "a");
    }

    #[tokio::test]
    async fn test_wait_ready_closed_when_publisher_dropped() {
        let publisher = SessionPublisher::new();
        let mut w = publisher.watch();
        drop(publisher);
        assert!(matches!(w.wait_ready().await, Err(SessionError::Closed)));
    }

    #[tokio::test]
    async fn test_changed_sees_next_session() {
        let publisher = SessionPublisher::new();
        let mut w = publisher.watch();
        publisher.publish(snapshot("a", 1));
        let next = w.changed().await.unwrap().unwrap();
        assert_eq!(next.session_id, "a");
    }
}
