//! Error types for the protocol layer.
//!
//! Each vigil crate defines its own error enum. A `ProtocolError` means
//! the peers disagree about the protocol or an event cannot be put on the
//! wire. Damaged frames are not in here: the decoder skips them without
//! raising anything.

use vigil_events::{EventError, EventType};

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The peer closed the stream before sending its negotiation record.
    #[error("peer closed the stream before the handshake completed")]
    Incomplete,

    /// The peer's negotiation record did not arrive in time.
    #[error("timed out waiting for the peer's negotiation record")]
    HandshakeTimeout,

    /// The peer's negotiation record has a wrong magic number or an
    /// incompatible major version. Fatal to the stream.
    #[error(
        "protocol version mismatch: peer sent {major}.{minor}.{patch} with magic {magic:#010x}"
    )]
    VersionMismatch {
        magic: u32,
        major: u16,
        minor: u16,
        patch: u16,
    },

    /// An event of an unregistered type was written.
    ///
    /// This is a programming or configuration error and is never retried.
    #[error("cannot serialize unknown event type {0}")]
    UnknownEventType(EventType),

    /// The registry failed to serialize an event.
    #[error(transparent)]
    Event(#[from] EventError),

    /// The message is invalid at the protocol level.
    ///
    /// For example, a first message that is not a negotiation record.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
