//! Dispatch events: the closed set of kinds the client understands and the
//! parser that turns a named payload into one of them.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::model::{DeletedMessage, Message, Reaction, Ready, TypingStart};
use crate::{ProtocolError, Snowflake};

/// Dispatch names that are recognised but never parsed or dispatched.
pub const SUPPRESSED_EVENTS: &[&str] = &[
    "PRESENCE_UPDATE",
    "USER_UPDATE",
    "VOICE_STATE_UPDATE",
    "VOICE_SERVER_UPDATE",
    "RESUMED",
    "RECONNECT",
    "INVALID_SESSION",
    "HELLO",
    "HEARTBEAT_ACK",
];

/// `true` for a dispatch name the client drops before parsing.
pub fn is_suppressed(name: &str) -> bool {
    SUPPRESSED_EVENTS.contains(&name)
}

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

/// What handlers register against.
///
/// `Unrecognized` collects every dispatch whose name is not in the table,
/// so a handler can still observe events this client has no model for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Ready,
    MessageCreate,
    MessageUpdate,
    MessageDelete,
    ReactionAdd,
    ReactionRemove,
    TypingStart,
    Unrecognized,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 8] = [
        Self::Ready,
        Self::MessageCreate,
        Self::MessageUpdate,
        Self::MessageDelete,
        Self::ReactionAdd,
        Self::ReactionRemove,
        Self::TypingStart,
        Self::Unrecognized,
    ];

    /// Maps a gateway event name to its kind. Names outside the table map
    /// to `Unrecognized`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "READY" => Self::Ready,
            "MESSAGE_CREATE" => Self::MessageCreate,
            "MESSAGE_UPDATE" => Self::MessageUpdate,
            "MESSAGE_DELETE" => Self::MessageDelete,
            "MESSAGE_REACTION_ADD" => Self::ReactionAdd,
            "MESSAGE_REACTION_REMOVE" => Self::ReactionRemove,
            "TYPING_START" => Self::TypingStart,
            _ => Self::Unrecognized,
        }
    }

    /// The gateway name for this kind (`"UNRECOGNIZED"` for the catch-all).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::MessageCreate => "MESSAGE_CREATE",
            Self::MessageUpdate => "MESSAGE_UPDATE",
            Self::MessageDelete => "MESSAGE_DELETE",
            Self::ReactionAdd => "MESSAGE_REACTION_ADD",
            Self::ReactionRemove => "MESSAGE_REACTION_REMOVE",
            Self::TypingStart => "TYPING_START",
            Self::Unrecognized => "UNRECOGNIZED",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A parsed dispatch.
///
/// Cloning is cheap for the large variants (they sit behind `Arc`), so the
/// dispatcher hands every handler its own copy.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Ready(Arc<Ready>),
    MessageCreate(Arc<Message>),
    MessageUpdate(Arc<Message>),
    MessageDelete(DeletedMessage),
    ReactionAdd(Reaction),
    ReactionRemove(Reaction),
    TypingStart(TypingStart),
    /// A dispatch this client has no model for.
    Unrecognized { name: String, payload: Arc<Value> },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Ready(_) => EventKind::Ready,
            Self::MessageCreate(_) => EventKind::MessageCreate,
            Self::MessageUpdate(_) => EventKind::MessageUpdate,
            Self::MessageDelete(_) => EventKind::MessageDelete,
            Self::ReactionAdd(_) => EventKind::ReactionAdd,
            Self::ReactionRemove(_) => EventKind::ReactionRemove,
            Self::TypingStart(_) => EventKind::TypingStart,
            Self::Unrecognized { .. } => EventKind::Unrecognized,
        }
    }

    /// The gateway name this event arrived under.
    pub fn name(&self) -> &str {
        match self {
            Self::Unrecognized { name, .. } => name,
            other => other.kind().as_str(),
        }
    }

    /// The channel the event happened in, when it has one.
    pub fn channel_id(&self) -> Option<Snowflake> {
        match self {
            Self::Ready(_) => None,
            Self::MessageCreate(m) | Self::MessageUpdate(m) => Some(m.channel_id),
            Self::MessageDelete(d) => Some(d.channel_id),
            Self::ReactionAdd(r) | Self::ReactionRemove(r) => Some(r.channel_id),
            Self::TypingStart(t) => Some(t.channel_id),
            Self::Unrecognized { payload, .. } => channel_of(payload),
        }
    }

    /// The message, for create and update events.
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Self::MessageCreate(m) | Self::MessageUpdate(m) => Some(m),
            _ => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(r) => write!(f, "Ready(session={}, user={})", r.session_id, r.user),
            Self::MessageCreate(m) | Self::MessageUpdate(m) => write!(f, "{m}"),
            Self::MessageDelete(d) => write!(f, "{d}"),
            Self::ReactionAdd(r) | Self::ReactionRemove(r) => write!(f, "{r}"),
            Self::TypingStart(t) => write!(f, "{t}"),
            Self::Unrecognized { name, .. } => write!(f, "Unrecognized({name})"),
        }
    }
}

/// Finds the channel a raw dispatch payload belongs to: `channel_id` at the
/// top level, else `message.channel_id`.
pub fn channel_of(payload: &Value) -> Option<Snowflake> {
    payload
        .get("channel_id")
        .or_else(|| payload.get("message").and_then(|m| m.get("channel_id")))
        .and_then(|v| Snowflake::deserialize(v).ok())
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parses a dispatch payload according to its event name.
///
/// Names outside the table never fail: they come back as
/// [`Event::Unrecognized`] with the raw payload.
///
/// # Errors
/// Returns `ProtocolError::Event` when a known event's payload is missing
/// a required field or has the wrong shape.
pub fn parse_event(name: &str, payload: Value) -> Result<Event, ProtocolError> {
    Ok(match EventKind::from_name(name) {
        EventKind::Ready => Event::Ready(Arc::new(typed(name, payload)?)),
        EventKind::MessageCreate => Event::MessageCreate(Arc::new(message(name, payload)?)),
        EventKind::MessageUpdate => Event::MessageUpdate(Arc::new(message(name, payload)?)),
        EventKind::MessageDelete => Event::MessageDelete(typed(name, payload)?),
        EventKind::ReactionAdd => Event::ReactionAdd(typed(name, payload)?),
        EventKind::ReactionRemove => Event::ReactionRemove(typed(name, payload)?),
        EventKind::TypingStart => Event::TypingStart(typed(name, payload)?),
        EventKind::Unrecognized => Event::Unrecognized {
            name: name.to_owned(),
            payload: Arc::new(payload),
        },
    })
}

fn typed<T: DeserializeOwned>(name: &str, payload: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(payload).map_err(|source| ProtocolError::Event {
        event: name.to_owned(),
        source,
    })
}

fn message(name: &str, payload: Value) -> Result<Message, ProtocolError> {
    let mut msg: Message = typed(name, payload)?;
    msg.inherit_member_user();
    Ok(msg)
}
