//! Error types for the stream layer.

use vigil_events::EventType;
use vigil_protocol::ProtocolError;
use vigil_transport::TransportError;

/// Errors that can occur on a [`FramedStream`](crate::FramedStream).
///
/// Transport and protocol faults are passed through unchanged; the stream
/// never retries. A caller seeing one of them should drop the stream and
/// reconnect.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The underlying connection failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Negotiation failed or an event could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The peer closed the stream and no further event can be read.
    #[error("stream closed by peer")]
    Closed,

    /// Only raw payloads can be written once the stream is coarse.
    #[error("cannot write event type {0} on a coarse stream")]
    CoarseWrite(EventType),
}
