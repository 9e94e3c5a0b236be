//! Connection state, as seen from outside the client.

use std::fmt;

/// Where the connection loop is right now.
///
/// ```text
/// Disconnected ──→ Connecting ──→ AwaitingHello ──→ Identifying ──→ Ready
///      ↑                │               │                │            │
///      └────────────────┴───────────────┴────────────────┴────────────┘
///                           (any error, after backoff)
/// ```
///
/// Published on a `watch` channel; see
/// [`GatewayClient::state`](crate::GatewayClient::state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayState {
    /// Not connected; waiting out the reconnect backoff (or not started).
    Disconnected,
    /// Opening the socket.
    Connecting,
    /// Socket open, waiting for the gateway's HELLO.
    AwaitingHello,
    /// Heartbeat running, identify sent, waiting for READY.
    Identifying,
    /// READY received; events are flowing.
    Ready,
}

impl GatewayState {
    /// `true` while a socket is open.
    pub fn is_connected(self) -> bool {
        !matches!(self, Self::Disconnected | Self::Connecting)
    }
}

impl fmt::Display for GatewayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingHello => "awaiting_hello",
            Self::Identifying => "identifying",
            Self::Ready => "ready",
        })
    }
}
