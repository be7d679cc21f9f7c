//! Event codec: the glue between the registry and the frame layer.
//!
//! [`EventCodec`] turns a typed event into frames (serialize with the
//! registry, then chunk) and a [`DecodedEvent`] back into a typed event.
//! It routes the reserved internal category to its own registry of
//! control events and everything else to the shared user registry.

use std::sync::Arc;

use vigil_events::{Event, EventError, EventType, Registry};

use crate::internal::register_internal;
use crate::{
    ChunkTermination, DEFAULT_MAX_EVENT_SIZE, DecodedEvent, FrameDecoder, FrameIdentity,
    INTERNAL_CATEGORY, ProtocolError, encode_frames,
};

/// Converts typed events to frames and back.
///
/// Cheap to share: the user registry sits behind an `Arc` and is only ever
/// read.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use vigil_events::Registry;
/// use vigil_protocol::{Ack, EventCodec};
///
/// let codec = EventCodec::new(Arc::new(Registry::new()));
///
/// // Encode to frames
/// let wire = codec.encode(&Ack::new(3)).unwrap();
///
/// // Decode back
/// let mut decoder = codec.decoder();
/// decoder.push(&wire);
/// let event = codec.decode_event(decoder.decode(false).unwrap()).unwrap();
/// assert_eq!(event.downcast_ref::<Ack>(), Some(&Ack::new(3)));
/// ```
#[derive(Debug)]
pub struct EventCodec {
    registry: Arc<Registry>,
    internal: Registry,
    termination: ChunkTermination,
    max_event_size: usize,
}

impl EventCodec {
    /// Creates a codec over `registry` with default framing settings.
    pub fn new(registry: Arc<Registry>) -> Self {
        let mut internal = Registry::new();
        // A fresh registry cannot already hold the control types.
        if let Err(e) = register_internal(&mut internal) {
            tracing::error!(error = %e, "failed to register protocol control events");
        }
        Self {
            registry,
            internal,
            termination: ChunkTermination::default(),
            max_event_size: DEFAULT_MAX_EVENT_SIZE,
        }
    }

    /// Sets the exact-multiple termination policy.
    pub fn with_termination(mut self, termination: ChunkTermination) -> Self {
        self.termination = termination;
        self
    }

    /// Sets the largest event body the decoders of this codec accept.
    pub fn with_max_event_size(mut self, max_event_size: usize) -> Self {
        self.max_event_size = max_event_size;
        self
    }

    pub fn termination(&self) -> ChunkTermination {
        self.termination
    }

    /// The shared user registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    fn registry_for(&self, event_type: EventType) -> &Registry {
        if event_type.category == INTERNAL_CATEGORY {
            &self.internal
        } else {
            &self.registry
        }
    }

    /// Serializes `event` and appends its frames to `out`.
    ///
    /// Returns the number of frames written.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::UnknownEventType`] if the event's type is not
    ///   registered.
    /// - [`ProtocolError::Event`] if the registry cannot serialize it.
    pub fn encode_into(&self, event: &dyn Event, out: &mut Vec<u8>) -> Result<usize, ProtocolError> {
        let event_type = event.event_type();
        let body = self
            .registry_for(event_type)
            .serialize(event)
            .map_err(|e| match e {
                EventError::UnknownEventType(t) => ProtocolError::UnknownEventType(t),
                other => ProtocolError::Event(other),
            })?;
        let identity = FrameIdentity::new(event_type, event.source_id(), event.destination_id());
        let frames = encode_frames(out, identity, &body, self.termination);
        tracing::trace!(%event_type, body = body.len(), frames, "encoded event");
        Ok(frames)
    }

    /// Serializes `event` into a fresh buffer of frames.
    pub fn encode(&self, event: &dyn Event) -> Result<Vec<u8>, ProtocolError> {
        let mut out = Vec::new();
        self.encode_into(event, &mut out)?;
        Ok(out)
    }

    /// Creates a decoder configured like this codec.
    pub fn decoder(&self) -> FrameDecoder {
        FrameDecoder::with_max_event_size(self.termination, self.max_event_size)
    }

    /// Rebuilds the typed event carried by `decoded`.
    ///
    /// Returns `None` when the body cannot become an event: its type is
    /// unknown to this side (kept quiet for compatibility with newer
    /// peers) or its body does not parse. Either way the frames were
    /// already consumed, so the stream just moves on.
    pub fn decode_event(&self, decoded: DecodedEvent) -> Option<Box<dyn Event>> {
        let DecodedEvent { identity, body } = decoded;
        let event_type = identity.event_type;
        match self.registry_for(event_type).deserialize(event_type, &body) {
            Ok(mut event) => {
                event.set_route(identity.source_id, identity.destination_id);
                Some(event)
            }
            Err(EventError::UnknownEventType(_)) => {
                tracing::info!(
                    %event_type,
                    bytes = body.len(),
                    "skipping event of unknown type"
                );
                None
            }
            Err(e) => {
                tracing::warn!(%event_type, error = %e, "skipping undecodable event");
                None
            }
        }
    }
}
