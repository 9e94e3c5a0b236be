//! Frames the client writes to the gateway.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Opcode, Snowflake};

/// An outbound frame: `{ "op": <code>, "d": <payload> }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundFrame<T> {
    /// Operation code.
    pub op: u16,
    /// Payload.
    pub d: T,
}

impl<T> OutboundFrame<T> {
    /// Wraps a payload with its opcode.
    pub fn new(op: Opcode, d: T) -> Self {
        Self { op: op.code(), d }
    }
}

/// Builds a heartbeat carrying the last seen sequence (`null` before the
/// first dispatch).
pub fn heartbeat(sequence: Option<u64>) -> OutboundFrame<Option<u64>> {
    OutboundFrame::new(Opcode::Heartbeat, sequence)
}

// ---------------------------------------------------------------------------
// Intents
// ---------------------------------------------------------------------------

/// Bitmask choosing which event families the gateway sends.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Intents(u64);

impl Intents {
    pub const GUILDS: Self = Self(1 << 0);
    pub const GUILD_MEMBERS: Self = Self(1 << 1);
    pub const GUILD_PRESENCES: Self = Self(1 << 8);
    pub const GUILD_MESSAGES: Self = Self(1 << 9);
    pub const GUILD_MESSAGE_REACTIONS: Self = Self(1 << 10);
    pub const GUILD_MESSAGE_TYPING: Self = Self(1 << 11);
    pub const DIRECT_MESSAGES: Self = Self(1 << 12);
    pub const DIRECT_MESSAGE_REACTIONS: Self = Self(1 << 13);
    pub const DIRECT_MESSAGE_TYPING: Self = Self(1 << 14);
    pub const MESSAGE_CONTENT: Self = Self(1 << 15);
    pub const GUILD_MESSAGE_POLLS: Self = Self(1 << 24);
    pub const DIRECT_MESSAGE_POLLS: Self = Self(1 << 25);

    /// No intents.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Everything a message/reaction/typing monitor needs.
    pub const fn messaging() -> Self {
        Self(
            Self::GUILDS.0
                | Self::GUILD_MESSAGES.0
                | Self::GUILD_MESSAGE_REACTIONS.0
                | Self::GUILD_MESSAGE_TYPING.0
                | Self::DIRECT_MESSAGES.0
                | Self::DIRECT_MESSAGE_REACTIONS.0
                | Self::DIRECT_MESSAGE_TYPING.0
                | Self::MESSAGE_CONTENT.0
                | Self::GUILD_MESSAGE_POLLS.0
                | Self::DIRECT_MESSAGE_POLLS.0,
        )
    }

    /// Builds a mask from raw bits.
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// The raw bits.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// `true` if every bit in `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for Intents {
    fn default() -> Self {
        Self::messaging()
    }
}

impl BitOr for Intents {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Intents {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Intents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Intents({:#x})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identify
// ---------------------------------------------------------------------------

/// Client metadata sent with identify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProperties {
    #[serde(rename = "$os")]
    pub os: String,
    #[serde(rename = "$browser")]
    pub browser: String,
    #[serde(rename = "$device")]
    pub device: String,
}

impl Default for ClientProperties {
    fn default() -> Self {
        Self {
            os: "windows".into(),
            browser: "chrome".into(),
            device: "chrome".into(),
        }
    }
}

/// Initial presence announced with identify.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Presence {
    pub status: String,
    pub since: u64,
    pub activities: Vec<Value>,
    pub afk: bool,
}

impl Default for Presence {
    fn default() -> Self {
        Self {
            status: "online".into(),
            since: 0,
            activities: Vec::new(),
            afk: false,
        }
    }
}

/// Payload of opcode 2.
#[derive(Clone, PartialEq, Serialize)]
pub struct Identify {
    pub token: String,
    pub properties: ClientProperties,
    pub presence: Presence,
    pub intents: Intents,
}

impl Identify {
    /// Identify with default properties, presence and intents.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            properties: ClientProperties::default(),
            presence: Presence::default(),
            intents: Intents::default(),
        }
    }

    /// Wraps this payload into its frame.
    pub fn into_frame(self) -> OutboundFrame<Self> {
        OutboundFrame::new(Opcode::Identify, self)
    }
}

// Never print the credential.
impl fmt::Debug for Identify {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identify")
            .field("token", &"<redacted>")
            .field("properties", &self.properties)
            .field("presence", &self.presence)
            .field("intents", &self.intents)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Guild subscriptions
// ---------------------------------------------------------------------------

/// Payload of opcode 36.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuildSubscription {
    pub guild_id: Snowflake,
}

/// Per-guild flags inside an opcode 37 payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubscriptionFlags {
    pub typing: bool,
    pub activities: bool,
    pub threads: bool,
}

/// Payload of opcode 37.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuildSubscriptionsBulk {
    pub subscriptions: BTreeMap<Snowflake, SubscriptionFlags>,
}

/// The two frames that subscribe to typing indicators for one guild,
/// in the order they must be sent.
pub fn guild_subscription(
    guild_id: Snowflake,
) -> (
    OutboundFrame<GuildSubscription>,
    OutboundFrame<GuildSubscriptionsBulk>,
) {
    let focus = OutboundFrame::new(Opcode::GuildSubscription, GuildSubscription { guild_id });
    let flags = SubscriptionFlags {
        typing: true,
        activities: true,
        threads: true,
    };
    let bulk = OutboundFrame::new(
        Opcode::GuildSubscriptionsBulk,
        GuildSubscriptionsBulk {
            subscriptions: BTreeMap::from([(guild_id, flags)]),
        },
    );
    (focus, bulk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_heartbeat_before_first_dispatch_is_null() {
        let value = serde_json::to_value(heartbeat(None)).unwrap();
        assert_eq!(value, json!({"op": 1, "d": null}));
    }

    #[test]
    fn test_heartbeat_carries_sequence() {
        let value = serde_json::to_value(heartbeat(Some(42))).unwrap();
        assert_eq!(value, json!({"op": 1, "d": 42}));
    }

    #[test]
    fn test_default_intents_match_messaging_bits() {
        let expected = (1 << 0)
            | (1 << 9)
            | (1 << 10)
            | (1 << 11)
            | (1 << 12)
            | (1 << 13)
            | (1 << 14)
            | (1 << 15)
            | (1 << 24)
            | (1 << 25);
        assert_eq!(Intents::default().bits(), expected);
        assert!(Intents::default().contains(Intents::MESSAGE_CONTENT));
        assert!(!Intents::default().contains(Intents::GUILD_PRESENCES));
    }

    #[test]
    fn test_intents_bitor() {
        let mut i = Intents::GUILDS | Intents::GUILD_MESSAGES;
        i |= Intents::MESSAGE_CONTENT;
        assert_eq!(i.bits(), (1 << 0) | (1 << 9) | (1 << 15));
    }

    #[test]
    fn test_identify_frame_shape() {
        let value = serde_json::to_value(Identify::new("secret").into_frame()).unwrap();
        assert_eq!(value["op"], 2);
        assert_eq!(value["d"]["token"], "secret");
        assert_eq!(value["d"]["properties"]["$os"], "windows");
        assert_eq!(value["d"]["properties"]["$browser"], "chrome");
        assert_eq!(value["d"]["presence"]["status"], "online");
        assert_eq!(value["d"]["presence"]["afk"], false);
        assert_eq!(value["d"]["intents"], Intents::default().bits());
    }

    #[test]
    fn test_identify_debug_redacts_token() {
        let rendered = format!("{:?}", Identify::new("super-secret"));
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_guild_subscription_frames() {
        let (focus, bulk) = guild_subscription(Snowflake(123));
        assert_eq!(
            serde_json::to_value(focus).unwrap(),
            json!({"op": 36, "d": {"guild_id": "123"}})
        );
        assert_eq!(
            serde_json::to_value(bulk).unwrap(),
            json!({"op": 37, "d": {"subscriptions": {"123": {
                "typing": true, "activities": true, "threads": true
            }}}})
        );
    }
}
