//! Wire protocol for Cordwire.
//!
//! This crate defines the "language" the gateway speaks:
//!
//! - **Envelope** ([`Envelope`], [`Opcode`], [`Hello`]): the outer frame
//!   every inbound message arrives in.
//! - **Events** ([`Event`], [`EventKind`], [`parse_event`]): the closed
//!   set of dispatches the client understands, parsed into typed payloads
//!   from [`model`].
//! - **Outbound frames** ([`outbound`]): identify, heartbeat and guild
//!   subscription frames, plus [`Intents`].
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how frames become text
//!   and back.
//! - **Errors** ([`ProtocolError`]): what can go wrong along the way.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the client
//! (session, dispatch). It doesn't know about sockets or handlers; it
//! only knows how to turn bytes into typed events and frames into text.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope → Event) → Client (dispatch)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod envelope;
mod error;
mod event;
pub mod model;
pub mod outbound;
mod snowflake;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

// Flat re-exports so callers write `cordwire_protocol::Envelope` instead of
// `cordwire_protocol::envelope::Envelope`.

pub use codec::{Codec, JsonCodec};
pub use envelope::{Envelope, Hello, Opcode};
pub use error::ProtocolError;
pub use event::{
    Event, EventKind, SUPPRESSED_EVENTS, channel_of, is_suppressed, parse_event,
};
pub use model::{
    CurrentUser, DeletedMessage, Emoji, Member, Message, Reaction, Ready, TypingStart, User,
};
pub use outbound::{Identify, Intents, OutboundFrame};
pub use snowflake::Snowflake;
