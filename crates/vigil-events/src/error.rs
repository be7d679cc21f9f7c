//! Error types for the event registry.

use crate::EventType;

/// Errors raised while registering, serializing or deserializing events.
///
/// Every decoding variant names the field that failed, so a log line is
/// enough to tell which part of a body was damaged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EventError {
    /// No registry entry exists for this (category, element) pair.
    #[error("unknown event type {0}")]
    UnknownEventType(EventType),

    /// A second registration was attempted for the same event type.
    #[error("event type {0} is already registered")]
    DuplicateEventType(EventType),

    /// The body ended before a fixed-size field could be read.
    #[error("field `{field}` needs {needed} bytes, {remaining} remain")]
    Truncated {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    /// A string or double field was not NUL terminated.
    #[error("field `{field}` is missing its NUL terminator")]
    MissingTerminator { field: &'static str },

    /// A string field holds a NUL character, which would end it early on
    /// the wire.
    #[error("field `{field}` contains a NUL character")]
    InteriorNul { field: &'static str },

    /// A string field did not hold valid UTF-8.
    #[error("field `{field}` is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },

    /// A double field held text that does not parse as a number.
    #[error("field `{field}` holds `{text}`, not a number")]
    InvalidDouble { field: &'static str, text: String },

    /// A field descriptor was used with an event of another concrete type,
    /// or fed a value of the wrong kind.
    #[error("field `{field}` does not apply to event type {event_type}")]
    AccessorMismatch {
        event_type: EventType,
        field: &'static str,
    },
}
