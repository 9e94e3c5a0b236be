//! Unified error type for the Cordwire client.

use cordwire_protocol::ProtocolError;
use cordwire_session::SessionError;
use cordwire_transport::TransportError;

use crate::config::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `cordwire` crate you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
///
/// Inside the connection loop every variant except `Config` is transient:
/// it ends the current attempt and the client reconnects after the
/// backoff.
#[derive(Debug, thiserror::Error)]
pub enum CordwireError {
    /// A transport-level error (connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, malformed payload).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Invalid or missing configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The gateway did not open the conversation the way it should
    /// (no HELLO, wrong first opcode, malformed READY).
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The gateway closed the socket.
    #[error("connection closed by gateway")]
    ConnectionClosed,

    /// The gateway sent opcode 7.
    #[error("gateway requested a reconnect")]
    ReconnectRequested,

    /// The gateway sent opcode 9.
    #[error("gateway invalidated the session")]
    InvalidSession,

    /// The heartbeat task stopped on its own.
    #[error("heartbeat stopped: {0}")]
    Heartbeat(String),
}
