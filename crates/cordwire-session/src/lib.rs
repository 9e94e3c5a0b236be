//! Gateway session state for Cordwire.
//!
//! A session is what one connection attempt knows about itself:
//!
//! 1. **Sequence**: the last dispatch number seen ([`SequenceTracker`]),
//!    sent back with every heartbeat
//! 2. **Identity**: who we are logged in as, learned from READY
//! 3. **Snapshots**: an immutable copy of the identity handed to
//!    handlers ([`SessionSnapshot`], read through a [`SessionWatch`])
//!
//! # Lifecycle
//!
//! ```text
//! HELLO ──→ Session::begin() ──→ READY ──→ authenticate() ──→ publish
//!                │                                              │
//!                └── record_sequence() on every dispatch        ▼
//!                                                     SessionWatch (handlers)
//! ```
//!
//! Every reconnect starts a brand new `Session`; nothing carries over.
//! The connection loop is the only writer. Handlers only ever see
//! snapshots, which stay valid after the session that produced them is
//! gone.

mod error;
mod sequence;
mod session;
mod watch;

pub use error::SessionError;
pub use sequence::{SequenceReader, SequenceTracker};
pub use session::{Session, SessionSnapshot, SessionState};
pub use watch::{SessionPublisher, SessionWatch};
