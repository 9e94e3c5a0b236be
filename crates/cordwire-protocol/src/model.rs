//! Typed payloads carried by dispatch events.
//!
//! Every struct here deserializes straight from the gateway's JSON with
//! serde derive. Optional fields are `#[serde(default)]` or `Option`, so a
//! payload that omits them still parses; fields the gateway always sends
//! (and that handlers rely on) are left required, and their absence is a
//! parse error for that one event.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;

use crate::Snowflake;

// ---------------------------------------------------------------------------
// Users and members
// ---------------------------------------------------------------------------

/// A user as it appears on messages, mentions and members.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Snowflake,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub discriminator: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub public_flags: u64,
    #[serde(default)]
    pub flags: Option<u64>,
    #[serde(default)]
    pub bot: bool,
}

impl User {
    /// The name to show: global name if set, else the username.
    pub fn name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.username)
    }
}

/// The account this connection is logged in as (from READY).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: Snowflake,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub discriminator: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub premium: bool,
    #[serde(default)]
    pub premium_type: Option<u8>,
    #[serde(default)]
    pub public_flags: u64,
}

impl CurrentUser {
    /// `true` if `message` mentions this user directly.
    pub fn mentioned_in(&self, message: &Message) -> bool {
        message.mentions.iter().any(|u| u.id == self.id)
    }
}

impl fmt::Display for CurrentUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.username, self.id)?;
        if let Some(global) = &self.global_name {
            write!(f, " - {global}")?;
        }
        Ok(())
    }
}

/// A guild member record.
///
/// On message payloads the gateway omits `member.user`; the parser fills it
/// in from the message author.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    #[serde(default)]
    pub joined_at: Option<String>,
    #[serde(default)]
    pub premium_since: Option<String>,
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub mute: bool,
    #[serde(default)]
    pub deaf: bool,
    #[serde(default)]
    pub flags: u64,
    #[serde(default)]
    pub communication_disabled_until: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub banner: Option<String>,
}

impl Member {
    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(user) = &self.user {
            write!(f, " by {}", user.username)?;
        }
        if let Some(nick) = &self.nick {
            write!(f, " ({nick})")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Message parts
// ---------------------------------------------------------------------------

/// Points at the message a reply or forward refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReference {
    #[serde(default)]
    pub message_id: Option<Snowflake>,
    #[serde(default)]
    pub channel_id: Option<Snowflake>,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    #[serde(rename = "type", default)]
    pub kind: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sticker {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub format_type: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedProvider {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedThumbnail {
    pub url: String,
    #[serde(default)]
    pub proxy_url: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub placeholder_version: Option<u32>,
    #[serde(default)]
    pub flags: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub provider: Option<EmbedProvider>,
    #[serde(default)]
    pub thumbnail: Option<EmbedThumbnail>,
    #[serde(default)]
    pub color: Option<u32>,
}

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Snowflake,
    pub filename: String,
    pub url: String,
    pub proxy_url: String,
    pub size: u64,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub content_scan_version: Option<u32>,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A message, as carried by `MESSAGE_CREATE` and `MESSAGE_UPDATE`.
///
/// Every field is optional on the wire. Update events in particular often
/// carry only a handful of them.
///
/// The type is recursive: a reply embeds the message it answers in
/// `referenced_message`, and a forward embeds copies of the forwarded
/// messages in `message_snapshots`. Both go through the same parser with no
/// depth cap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    pub id: Option<Snowflake>,
    #[serde(rename = "type")]
    pub kind: u32,
    pub content: String,
    pub channel_id: Snowflake,
    pub guild_id: Option<Snowflake>,
    pub author: Option<User>,
    pub member: Option<Member>,
    pub timestamp: String,
    pub edited_timestamp: Option<String>,
    pub tts: bool,
    pub mention_everyone: bool,
    pub mentions: Vec<User>,
    pub mention_roles: Vec<Snowflake>,
    pub attachments: Vec<Attachment>,
    pub embeds: Vec<Embed>,
    pub pinned: bool,
    pub flags: u64,
    pub components: Vec<Value>,
    pub referenced_message: Option<Box<Message>>,
    pub message_reference: Option<MessageReference>,
    pub sticker_items: Vec<Sticker>,
    pub position: Option<u64>,
    pub channel_type: Option<u8>,
    #[serde(deserialize_with = "snapshots")]
    pub message_snapshots: Vec<Message>,
}

impl Message {
    /// `true` if this message replies to (or forwards) another one.
    pub fn is_reply(&self) -> bool {
        self.message_reference.is_some()
    }

    pub fn is_edited(&self) -> bool {
        self.edited_timestamp.is_some()
    }

    pub fn has_stickers(&self) -> bool {
        !self.sticker_items.is_empty()
    }

    /// `true` if this message carries forwarded snapshots.
    pub fn is_forwarded(&self) -> bool {
        !self.message_snapshots.is_empty()
    }

    /// Gives `member` the author as its user when the gateway left it out,
    /// here and in every nested message.
    pub(crate) fn inherit_member_user(&mut self) {
        if let Some(member) = self.member.as_mut() {
            if member.user.is_none() {
                member.user = self.author.clone();
            }
        }
        if let Some(referenced) = self.referenced_message.as_mut() {
            referenced.inherit_member_user();
        }
        for snapshot in &mut self.message_snapshots {
            snapshot.inherit_member_user();
        }
    }

    fn author_name(&self) -> &str {
        self.author.as_ref().map_or("Unknown", |a| a.username.as_str())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Message(")?;
        match self.id {
            Some(id) => write!(f, "id={id}")?,
            None => write!(f, "id=?")?,
        }
        write!(f, ", author={}, content={:?})", self.author_name(), self.content)?;
        if self.is_edited() {
            write!(f, " (edited)")?;
        }
        if self.is_reply() {
            write!(f, " (reply)")?;
        }
        if self.has_stickers() {
            write!(f, " ({} stickers)", self.sticker_items.len())?;
        }
        if self.is_forwarded() {
            writeln!(f, " (forwarded messages:")?;
            for snapshot in &self.message_snapshots {
                writeln!(f, "  - {}: {}", snapshot.author_name(), snapshot.content)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// A snapshot arrives either wrapped as `{ "message": {...} }` or bare.
///
/// The shape is picked by the `message` key alone, so a wrapped snapshot
/// whose inner message is malformed fails instead of parsing as an empty
/// bare one.
fn snapshots<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Message>, D::Error> {
    let raw: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    raw.unwrap_or_default()
        .into_iter()
        .map(|mut snapshot| {
            let inner = match snapshot.as_object_mut().and_then(|o| o.remove("message")) {
                Some(message) => message,
                None => snapshot,
            };
            Message::deserialize(inner).map_err(de::Error::custom)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Other event payloads
// ---------------------------------------------------------------------------

/// Payload of `MESSAGE_DELETE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedMessage {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
}

impl fmt::Display for DeletedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeletedMessage(id={}, channel_id={})", self.id, self.channel_id)
    }
}

/// A reaction emoji. Unicode emoji have no id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emoji {
    #[serde(default)]
    pub id: Option<Snowflake>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub animated: bool,
}

/// Payload of `MESSAGE_REACTION_ADD` and `MESSAGE_REACTION_REMOVE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub user_id: Snowflake,
    pub channel_id: Snowflake,
    pub message_id: Snowflake,
    pub emoji: Emoji,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    #[serde(rename = "type", default)]
    pub kind: u8,
    #[serde(default)]
    pub burst: bool,
    #[serde(default)]
    pub message_author_id: Option<Snowflake>,
    #[serde(default)]
    pub member: Option<Member>,
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Reaction(emoji={}, message_id={}, user_id={})",
            self.emoji.name.as_deref().unwrap_or("?"),
            self.message_id,
            self.user_id
        )?;
        if let Some(user) = self.member.as_ref().and_then(|m| m.user.as_ref()) {
            write!(f, " by {}", user.username)?;
        }
        Ok(())
    }
}

/// Payload of `TYPING_START`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingStart {
    pub user_id: Snowflake,
    pub channel_id: Snowflake,
    /// Unix seconds.
    pub timestamp: u64,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    #[serde(default)]
    pub member: Option<Member>,
}

impl fmt::Display for TypingStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TypingStart(user_id={}, channel={})",
            self.user_id, self.channel_id
        )?;
        if let Some(member) = &self.member {
            member.describe(f)?;
        }
        Ok(())
    }
}

/// Payload of `READY`, trimmed to what the client uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ready {
    pub session_id: String,
    pub user: CurrentUser,
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_with_no_fields_parses_to_defaults() {
        let msg: Message = serde_json::from_value(json!({})).unwrap();
        assert_eq!(msg.id, None);
        assert!(msg.content.is_empty());
        assert!(msg.mentions.is_empty());
        assert!(!msg.is_reply());
        assert!(!msg.is_forwarded());
    }

    #[test]
    fn test_snapshots_accept_wrapped_and_bare_forms() {
        let msg: Message = serde_json::from_value(json!({
            "id": "1",
            "message_snapshots": [
                {"message": {"content": "wrapped"}},
                {"content": "bare"}
            ]
        }))
        .unwrap();
        let contents: Vec<_> = msg
            .message_snapshots
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, ["wrapped", "bare"]);
        assert!(msg.is_forwarded());
    }

    #[test]
    fn test_null_snapshots_is_empty() {
        let msg: Message = serde_json::from_value(json!({"message_snapshots": null})).unwrap();
        assert!(msg.message_snapshots.is_empty());
    }

    #[test]
    fn test_mentioned_in() {
        let me = CurrentUser {
            id: Snowflake(7),
            ..Default::default()
        };
        let msg: Message = serde_json::from_value(json!({
            "mentions": [{"id": "3", "username": "a"}, {"id": "7", "username": "me"}]
        }))
        .unwrap();
        assert!(me.mentioned_in(&msg));
        assert!(!me.mentioned_in(&Message::default()));
    }

    #[test]
    fn test_message_display_flags() {
        let msg: Message = serde_json::from_value(json!({
            "id": "5",
            "content": "hi",
            "author": {"id": "1", "username": "ann"},
            "edited_timestamp": "2024-01-01T00:00:00Z",
            "message_reference": {"message_id": "4"}
        }))
        .unwrap();
        let text = msg.to_string();
        assert!(text.starts_with("Message(id=5, author=ann"));
        assert!(text.contains("(edited)"));
        assert!(text.contains("(reply)"));
    }

    #[test]
    fn test_user_name_prefers_global_name() {
        let mut user = User {
            username: "handle".into(),
            ..Default::default()
        };
        assert_eq!(user.name(), "handle");
        user.global_name = Some("Display".into());
        assert_eq!(user.name(), "Display");
    }
}
