//! Session types: what one connection attempt knows about itself.
//!
//! A session tracks:
//! - HOW OFTEN to heartbeat (from HELLO)
//! - WHERE we are in the dispatch stream (the sequence)
//! - WHO we are (from READY)

use std::sync::Arc;
use std::time::Duration;

use cordwire_protocol::{CurrentUser, Snowflake};
use tokio::time::Instant;
use tracing::debug;

use crate::{SequenceReader, SequenceTracker, SessionError};

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where the session is in its short life.
///
/// ```text
///   AwaitingReady ──(READY)──→ Authenticated
/// ```
///
/// There is no way back: a new connection builds a new `Session`.
#[derive(Debug, Clone)]
pub enum SessionState {
    /// HELLO received, identify sent, waiting for READY.
    AwaitingReady,

    /// READY received.
    Authenticated { snapshot: Arc<SessionSnapshot> },
}

// ---------------------------------------------------------------------------
// SessionSnapshot
// ---------------------------------------------------------------------------

/// Immutable copy of an authenticated session, shared with handlers.
///
/// Handlers hold these behind `Arc`, so one taken before a reconnect
/// stays readable afterwards; it just describes the old session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    /// Gateway-assigned session id.
    pub session_id: String,
    /// The account this session is logged in as.
    pub user: CurrentUser,
    /// Heartbeat interval negotiated at HELLO.
    pub heartbeat_interval: Duration,
    /// When READY arrived.
    pub authenticated_at: Instant,
}

impl SessionSnapshot {
    pub fn user_id(&self) -> Snowflake {
        self.user.id
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The state of one connection attempt.
///
/// Owned by the connection loop, which is its only writer. Identity is not
/// known yet when the heartbeat has to start (at HELLO), so creation and
/// authentication are two separate calls.
#[derive(Debug)]
pub struct Session {
    heartbeat_interval: Duration,
    sequence: SequenceTracker,
    state: SessionState,
    started_at: Instant,
}

impl Session {
    /// Starts a fresh session after HELLO. The sequence starts as `None`.
    pub fn begin(heartbeat_interval: Duration) -> Self {
        debug!(interval_ms = heartbeat_interval.as_millis() as u64, "session started");
        Self {
            heartbeat_interval,
            sequence: SequenceTracker::new(),
            state: SessionState::AwaitingReady,
            started_at: Instant::now(),
        }
    }

    /// Records the identity from READY and returns the snapshot to publish.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyAuthenticated`] if READY was already
    /// processed for this session.
    pub fn authenticate(
        &mut self,
        session_id: impl Into<String>,
        user: CurrentUser,
    ) -> Result<Arc<SessionSnapshot>, SessionError> {
        if let SessionState::Authenticated { snapshot } = &self.state {
            return Err(SessionError::AlreadyAuthenticated(
                snapshot.session_id.clone(),
            ));
        }

        let snapshot = Arc::new(SessionSnapshot {
            session_id: session_id.into(),
            user,
            heartbeat_interval: self.heartbeat_interval,
            authenticated_at: Instant::now(),
        });
        self.state = SessionState::Authenticated {
            snapshot: Arc::clone(&snapshot),
        };
        Ok(snapshot)
    }

    /// Records a dispatch sequence. See [`SequenceTracker::record`].
    pub fn record_sequence(&self, seq: u64) -> bool {
        self.sequence.record(seq)
    }

    pub fn current_sequence(&self) -> Option<u64> {
        self.sequence.current()
    }

    /// A reader for the heartbeat task.
    pub fn sequence_reader(&self) -> SequenceReader {
        self.sequence.reader()
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated { .. })
    }

    /// The snapshot taken at READY.
    ///
    /// # Errors
    /// Returns [`SessionError::NotAuthenticated`] before READY.
    pub fn snapshot(&self) -> Result<Arc<SessionSnapshot>, SessionError> {
        match &self.state {
            SessionState::Authenticated { snapshot } => Ok(Arc::clone(snapshot)),
            SessionState::AwaitingReady => Err(SessionError::NotAuthenticated),
        }
    }

    /// How long ago HELLO arrived.
    pub fn age(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for `Session`.
    //!
    //! Naming follows `test_{function}_{scenario}_{expected}`.

    use super::*;

    fn me() -> CurrentUser {
        CurrentUser {
            id: Snowflake(77),
            username: "me".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_begin_starts_without_sequence() {
        let s = Session::begin(Duration::from_millis(41_250));
        assert_eq!(s.current_sequence(), None);
        assert_eq!(s.heartbeat_interval(), Duration::from_millis(41_250));
        assert!(!s.is_authenticated());
    }

    #[test]
    fn test_snapshot_before_ready_not_authenticated() {
        let s = Session::begin(Duration::from_secs(1));
        assert!(matches!(s.snapshot(), Err(SessionError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_authenticate_records_identity() {
        let mut s = Session::begin(Duration::from_secs(1));
        let snap = s.authenticate("abc", me()).unwrap();
        assert_eq!(snap.session_id, "abc");
        assert_eq!(snap.user_id(), Snowflake(77));
        assert_eq!(snap.heartbeat_interval, Duration::from_secs(1));
        assert!(s.is_authenticated());
        assert_eq!(s.snapshot().unwrap(), snap);
    }

    #[tokio::test]
    async fn test_authenticate_twice_already_authenticated() {
        let mut s = Session::begin(Duration::from_secs(1));
        s.authenticate("abc", me()).unwrap();
        let err = s.authenticate("def", me()).unwrap_err();
        assert!(matches!(err, SessionError::AlreadyAuthenticated(id) if id == "abc"));
    }

    #[test]
    fn test_record_sequence_is_monotonic() {
        let s = Session::begin(Duration::from_secs(1));
        assert!(s.record_sequence(2));
        assert!(!s.record_sequence(1));
        assert_eq!(s.current_sequence(), Some(2));
    }

    #[test]
    fn test_new_session_resets_sequence() {
        let old = Session::begin(Duration::from_secs(1));
        old.record_sequence(99);
        let fresh = Session::begin(Duration::from_secs(1));
        assert_eq!(fresh.current_sequence(), None);
    }

    #[tokio::test]
    async fn test_snapshot_outlives_session() {
        let mut s = Session::begin(Duration::from_secs(1));
        let snap = s.authenticate("abc", me()).unwrap();
        drop(s);
        assert_eq!(snap.session_id, "abc");
    }

    #[test]
    fn test_sequence_reader_tracks_session() {
        let s = Session::begin(Duration::from_secs(1));
        let reader = s.sequence_reader();
        s.record_sequence(3);
        assert_eq!(reader.get(), Some(3));
    }
}
