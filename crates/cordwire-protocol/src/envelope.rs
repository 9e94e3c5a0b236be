//! The top-level gateway frame and its opcodes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Opcode
// ---------------------------------------------------------------------------

/// Gateway operation codes this client knows about.
///
/// The envelope keeps the raw `u16` so an opcode outside this table still
/// decodes; [`Envelope::opcode`] returns `None` for it and the connection
/// loop logs and ignores the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    /// Server → client: a named event (`t`) with payload and sequence.
    Dispatch = 0,
    /// Either direction: keep-alive. Inbound means "beat now".
    Heartbeat = 1,
    /// Client → server: authenticate the session.
    Identify = 2,
    /// Client → server: update own presence.
    PresenceUpdate = 3,
    /// Client → server: join/leave voice.
    VoiceStateUpdate = 4,
    /// Client → server: resume a dropped session.
    Resume = 6,
    /// Server → client: reconnect and start over.
    Reconnect = 7,
    /// Client → server: request guild members.
    RequestGuildMembers = 8,
    /// Server → client: the session is not valid.
    InvalidSession = 9,
    /// Server → client: first frame, carries the heartbeat interval.
    Hello = 10,
    /// Server → client: heartbeat acknowledged.
    HeartbeatAck = 11,
    /// Client → server: focus a guild (precedes a subscription update).
    GuildSubscription = 36,
    /// Client → server: per-guild subscription flags (typing, threads...).
    GuildSubscriptionsBulk = 37,
}

impl Opcode {
    /// The wire value.
    pub fn code(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for Opcode {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Dispatch,
            1 => Self::Heartbeat,
            2 => Self::Identify,
            3 => Self::PresenceUpdate,
            4 => Self::VoiceStateUpdate,
            6 => Self::Resume,
            7 => Self::Reconnect,
            8 => Self::RequestGuildMembers,
            9 => Self::InvalidSession,
            10 => Self::Hello,
            11 => Self::HeartbeatAck,
            36 => Self::GuildSubscription,
            37 => Self::GuildSubscriptionsBulk,
            other => return Err(other),
        })
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// One decoded gateway frame.
///
/// ```text
/// { "op": 0, "s": 42, "t": "MESSAGE_CREATE", "d": { ... } }
///    │        │        │                        └─ payload
///    │        │        └─ event name (dispatch only)
///    │        └─ sequence (dispatch only)
///    └─ opcode
/// ```
///
/// Built once per inbound frame and dropped once the payload has been
/// parsed into an [`Event`](crate::Event).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Raw operation code.
    pub op: u16,

    /// Sequence number. Present on dispatches, `null` otherwise.
    #[serde(rename = "s", default)]
    pub sequence: Option<u64>,

    /// Event name. Present on dispatches, `null` otherwise.
    #[serde(rename = "t", default)]
    pub event: Option<String>,

    /// Untyped payload; `Value::Null` when the frame has no `d`.
    #[serde(rename = "d", default)]
    pub payload: Value,
}

impl Envelope {
    /// The known opcode, or `None` for an opcode this client doesn't handle.
    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::try_from(self.op).ok()
    }

    /// Takes the payload out of a `Hello` frame.
    pub fn hello(&self) -> Result<Hello, crate::ProtocolError> {
        Hello::deserialize(&self.payload).map_err(crate::ProtocolError::Decode)
    }
}

/// Payload of opcode 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    /// Milliseconds between heartbeats.
    #[serde(alias = "heartbeat_interval_ms")]
    pub heartbeat_interval: u64,
}
