//! Error types for the session layer.

/// Errors that can occur while reading or advancing a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// READY has not arrived yet, so there is no identity to report.
    #[error("session is not authenticated yet")]
    NotAuthenticated,

    /// READY arrived twice on the same connection.
    #[error("session {0} is already authenticated")]
    AlreadyAuthenticated(String),

    /// The client that published snapshots has shut down.
    #[error("session publisher closed")]
    Closed,
}
