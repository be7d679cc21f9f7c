//! Unified error type for vigil.

use vigil_events::EventError;
use vigil_protocol::ProtocolError;
use vigil_stream::StreamError;
use vigil_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `vigil` meta-crate, you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum VigilError {
    /// A transport-level error (connect, send, recv, compression).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An event body could not be serialized or parsed.
    #[error(transparent)]
    Event(#[from] EventError),

    /// A protocol-level error (negotiation, unknown event type).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A stream-level error (closed, coarse write).
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// The configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Reading a file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use vigil_events::EventType;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let vigil_err: VigilError = err.into();
        assert!(matches!(vigil_err, VigilError::Transport(_)));
        assert!(vigil_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_event_error() {
        let err = EventError::UnknownEventType(EventType::new(1, 2));
        let vigil_err: VigilError = err.into();
        assert!(matches!(vigil_err, VigilError::Event(_)));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let vigil_err: VigilError = err.into();
        assert!(matches!(vigil_err, VigilError::Protocol(_)));
    }

    #[test]
    fn test_from_stream_error() {
        let vigil_err: VigilError = StreamError::Closed.into();
        assert!(matches!(vigil_err, VigilError::Stream(StreamError::Closed)));
        assert_eq!(vigil_err.to_string(), "stream closed by peer");
    }

    #[test]
    fn test_from_io_error() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let vigil_err: VigilError = err.into();
        assert!(matches!(vigil_err, VigilError::Io(_)));
    }
}
