//! # Cordwire
//!
//! Persistent client for a Discord-style realtime gateway.
//!
//! Cordwire keeps one authenticated WebSocket session alive: it performs
//! the HELLO/identify handshake, heartbeats on the interval the gateway
//! asks for, parses dispatches into typed [`Event`]s and runs the handlers
//! you register, each in its own task under a global concurrency bound.
//! When the connection drops it starts over with a fresh session.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cordwire::prelude::*;
//!
//! # async fn run() -> Result<(), CordwireError> {
//! let config = ClientConfig::from_env()?;
//! let mut client = GatewayClient::new(config);
//! client.on(EventKind::MessageCreate, |event| async move {
//!     if let Some(message) = event.as_message() {
//!         println!("{message}");
//!     }
//!     Ok::<(), HandlerError>(())
//! });
//! client.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await
//! # }
//! ```
//!
//! ## Crates
//!
//! | crate | role |
//! |---|---|
//! | `cordwire-transport` | [`Connector`]/[`Connection`] traits, WebSocket and in-memory transports |
//! | `cordwire-protocol` | envelope codec, outbound frames, typed events and models |
//! | `cordwire-session` | per-connection session, sequence tracking, snapshot watch |
//! | `cordwire-heartbeat` | heartbeat timing and metrics |
//! | `cordwire` | connection loop, dispatcher, config, logging, chunking |

pub mod chunk;
mod client;
pub mod config;
pub mod dispatch;
mod error;
mod heartbeat;
pub mod logging;
mod state;

pub use client::GatewayClient;
pub use config::{ClientConfig, ConfigError};
pub use dispatch::{BoxedHandler, Dispatcher, HandlerError, HandlerRegistry, HandlerResult};
pub use error::CordwireError;
pub use state::GatewayState;

pub use cordwire_heartbeat::{HeartbeatConfig, HeartbeatMetrics};
pub use cordwire_protocol::{self as protocol, Event, EventKind, Snowflake};
pub use cordwire_session::{SessionSnapshot, SessionWatch};
pub use cordwire_transport::{self as transport, Connection, Connector};

/// Everything a bot needs, in one import.
pub mod prelude {
    pub use crate::chunk::{MAX_CONTENT_LEN, chunk_content};
    pub use crate::{
        ClientConfig, CordwireError, Event, EventKind, GatewayClient, GatewayState, HandlerError,
        HandlerResult, SessionSnapshot, SessionWatch, Snowflake,
    };
    pub use cordwire_protocol::{
        CurrentUser, DeletedMessage, Emoji, Member, Message, Reaction, Ready, TypingStart, User,
    };
}
