//! Error types for the protocol layer.
//!
//! Each crate in Cordwire defines its own error enum. When you see a
//! `ProtocolError`, the problem is in the bytes or the shape of a payload,
//! never in the socket underneath it.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization of an outbound frame failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The frame is not valid JSON, or is missing `op`.
    ///
    /// The connection loop logs this and keeps reading; one bad frame
    /// never takes the connection down.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A dispatch payload did not match the shape its event name promises,
    /// typically because a required field (a reaction's `emoji`, a
    /// deletion's `id`) is missing.
    #[error("malformed {event} payload: {source}")]
    Event {
        /// The gateway event name, e.g. `MESSAGE_REACTION_ADD`.
        event: String,
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}
