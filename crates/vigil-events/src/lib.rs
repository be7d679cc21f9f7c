//! Event model and type registry for vigil.
//!
//! This crate answers one question for the frame codec: "how does an event
//! of type X turn into bytes, and back?"
//!
//! - **Events** ([`Event`], [`EventType`]) are plain structs identified by
//!   a (category, element) pair.
//! - **Fields** ([`Field`], [`FieldKind`], [`FieldValue`]) describe one
//!   member of an event and its fixed wire encoding.
//! - **The registry** ([`Registry`]) maps each event type to a factory and
//!   an ordered field table, and serializes or deserializes whole bodies.
//!
//! The registry is an explicit value: build it at startup, wrap it in an
//! `Arc`, and hand it to every stream. Nothing in here is global.
//!
//! ```text
//! Event (struct) → Registry (body bytes) → Protocol (frames)
//! ```

mod error;
mod event;
mod field;
mod registry;

pub use error::EventError;
pub use event::{AsAny, Event, EventType};
pub use field::{Field, FieldKind, FieldValue};
pub use registry::{EventInfo, Factory, Registry};
