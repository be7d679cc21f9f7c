//! The event type registry.
//!
//! The registry maps an [`EventType`] to everything needed to move that
//! event across the wire: a display name, a factory producing an empty
//! instance, and the ordered field table. It is built once at startup,
//! then shared read-only (behind an `Arc`) by every stream that needs it.
//! Lookups take `&self`, so any number of streams can serialize and
//! deserialize concurrently without locking.

use std::collections::HashMap;

use crate::{Event, EventError, EventType, Field, FieldValue};

/// Creates an empty instance of a registered event type.
pub type Factory = fn() -> Box<dyn Event>;

/// Everything the registry knows about one event type.
#[derive(Debug)]
pub struct EventInfo {
    event_type: EventType,
    name: String,
    factory: Factory,
    fields: Vec<Field>,
}

impl EventInfo {
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Creates an empty instance through the registered factory.
    pub fn create(&self) -> Box<dyn Event> {
        (self.factory)()
    }
}

/// Maps event types to their factories and field tables.
#[derive(Debug, Default)]
pub struct Registry {
    types: HashMap<EventType, EventInfo>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an event type.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::DuplicateEventType`] if `event_type` is
    /// already registered; the existing entry is left untouched.
    pub fn register(
        &mut self,
        event_type: EventType,
        name: impl Into<String>,
        factory: Factory,
        fields: Vec<Field>,
    ) -> Result<(), EventError> {
        if self.types.contains_key(&event_type) {
            return Err(EventError::DuplicateEventType(event_type));
        }
        let name = name.into();
        tracing::debug!(
            %event_type,
            name = %name,
            fields = fields.len(),
            "registered event type"
        );
        self.types.insert(
            event_type,
            EventInfo {
                event_type,
                name,
                factory,
                fields,
            },
        );
        Ok(())
    }

    /// Looks up an event type.
    pub fn lookup(&self, event_type: EventType) -> Option<&EventInfo> {
        self.types.get(&event_type)
    }

    /// Returns `true` if `event_type` is registered.
    pub fn contains(&self, event_type: EventType) -> bool {
        self.types.contains_key(&event_type)
    }

    /// Number of registered event types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterates over every registered entry, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &EventInfo> {
        self.types.values()
    }

    /// Serializes `event`'s fields, in table order, into a body.
    ///
    /// # Errors
    ///
    /// - [`EventError::UnknownEventType`] if the event's type is not
    ///   registered.
    /// - [`EventError::AccessorMismatch`] if a field accessor does not
    ///   apply to the concrete event (the table was registered for a
    ///   different struct).
    /// - [`EventError::InteriorNul`] if a string field contains `'\0'`.
    pub fn serialize(&self, event: &dyn Event) -> Result<Vec<u8>, EventError> {
        let event_type = event.event_type();
        let info = self
            .lookup(event_type)
            .ok_or(EventError::UnknownEventType(event_type))?;
        let mut body = Vec::new();
        for field in &info.fields {
            let value = field.get(event).ok_or(EventError::AccessorMismatch {
                event_type,
                field: field.name(),
            })?;
            if matches!(&value, FieldValue::String(text) if text.contains('\0')) {
                return Err(EventError::InteriorNul {
                    field: field.name(),
                });
            }
            value.encode(&mut body);
        }
        tracing::trace!(%event_type, bytes = body.len(), "serialized event body");
        Ok(body)
    }

    /// Rebuilds an event of `event_type` from its body.
    ///
    /// Bytes left over after the last field are ignored, so a reader keeps
    /// working when a newer writer appends fields to a type.
    ///
    /// # Errors
    ///
    /// - [`EventError::UnknownEventType`] if `event_type` is not registered.
    /// - Any decoding error from [`FieldValue::decode`].
    /// - [`EventError::AccessorMismatch`] if the factory builds a struct the
    ///   field table was not written for.
    pub fn deserialize(
        &self,
        event_type: EventType,
        body: &[u8],
    ) -> Result<Box<dyn Event>, EventError> {
        let info = self
            .lookup(event_type)
            .ok_or(EventError::UnknownEventType(event_type))?;
        let mut event = info.create();
        let mut input = body;
        for field in &info.fields {
            let value = FieldValue::decode(field.kind(), field.name(), &mut input)?;
            if !field.set(&mut *event, value) {
                return Err(EventError::AccessorMismatch {
                    event_type,
                    field: field.name(),
                });
            }
        }
        if !input.is_empty() {
            tracing::debug!(
                %event_type,
                extra = input.len(),
                "ignoring trailing bytes after last field"
            );
        }
        tracing::trace!(%event_type, bytes = body.len(), "deserialized event body");
        Ok(event)
    }
}
