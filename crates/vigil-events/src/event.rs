//! The [`Event`] trait and its type identifier.

use std::any::Any;
use std::fmt;

/// The two-part identifier of an event's type.
///
/// `category` groups related events (one per producing module in a
/// broker deployment), `element` picks one event within the category.
/// Together they are the registry key and appear verbatim in every frame
/// header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventType {
    pub category: u16,
    pub element: u16,
}

impl EventType {
    /// Creates an event type from its two halves.
    pub const fn new(category: u16, element: u16) -> Self {
        Self { category, element }
    }

    /// Packs the pair into one `u32`, category in the high half.
    pub const fn id(self) -> u32 {
        ((self.category as u32) << 16) | self.element as u32
    }

    /// Splits a packed `u32` back into its two halves.
    pub const fn from_id(id: u32) -> Self {
        Self {
            category: (id >> 16) as u16,
            element: id as u16,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.element)
    }
}

/// Access to a value as [`Any`], implemented for every `'static` type.
///
/// This is what lets a type-erased `&dyn Event` be turned back into the
/// concrete struct a field accessor was written for.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A typed monitoring event.
///
/// Implementors are plain structs; the registry knows how to turn their
/// fields into bytes. The routing pair (`source_id`, `destination_id`)
/// travels in the frame header rather than in the body, so events that
/// care about it override [`set_route`](Event::set_route) to keep what
/// the decoder found there.
pub trait Event: AsAny + fmt::Debug + Send + Sync + 'static {
    /// The (category, element) pair this event is registered under.
    fn event_type(&self) -> EventType;

    /// Identifier of the node that produced the event.
    fn source_id(&self) -> u32 {
        0
    }

    /// Identifier of the node the event is addressed to.
    fn destination_id(&self) -> u32 {
        0
    }

    /// Stores the routing pair read from the frame header.
    fn set_route(&mut self, _source_id: u32, _destination_id: u32) {}
}

impl dyn Event {
    /// Returns `true` if the concrete type behind this event is `T`.
    pub fn is<T: Event>(&self) -> bool {
        AsAny::as_any(self).is::<T>()
    }

    /// Borrows the concrete event, if it is a `T`.
    pub fn downcast_ref<T: Event>(&self) -> Option<&T> {
        AsAny::as_any(self).downcast_ref::<T>()
    }

    /// Mutably borrows the concrete event, if it is a `T`.
    pub fn downcast_mut<T: Event>(&mut self) -> Option<&mut T> {
        AsAny::as_any_mut(self).downcast_mut::<T>()
    }

    /// Takes ownership of the concrete event, if it is a `T`.
    pub fn downcast<T: Event>(self: Box<Self>) -> Option<Box<T>> {
        AsAny::into_any(self).downcast::<T>().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Ping {
        seq: u32,
    }

    impl Event for Ping {
        fn event_type(&self) -> EventType {
            EventType::new(9, 1)
        }
    }

    #[derive(Debug)]
    struct Pong;

    impl Event for Pong {
        fn event_type(&self) -> EventType {
            EventType::new(9, 2)
        }
    }

    #[test]
    fn test_event_type_id_packs_category_high() {
        let ty = EventType::new(0x0001, 0x0018);
        assert_eq!(ty.id(), 0x0001_0018);
        assert_eq!(EventType::from_id(0x0001_0018), ty);
    }

    #[test]
    fn test_event_type_display() {
        assert_eq!(EventType::new(3, 27).to_string(), "3:27");
    }

    #[test]
    fn test_downcast_ref_through_box() {
        let event: Box<dyn Event> = Box::new(Ping { seq: 4 });
        assert!(event.is::<Ping>());
        assert!(!event.is::<Pong>());
        assert_eq!(event.downcast_ref::<Ping>().unwrap().seq, 4);
        assert!(event.downcast_ref::<Pong>().is_none());
    }

    #[test]
    fn test_downcast_mut_and_owned() {
        let mut event: Box<dyn Event> = Box::new(Ping::default());
        event.downcast_mut::<Ping>().unwrap().seq = 11;
        let ping = event.downcast::<Ping>().unwrap();
        assert_eq!(ping.seq, 11);
    }

    #[test]
    fn test_default_route_is_zero() {
        let mut ping = Ping::default();
        ping.set_route(5, 6);
        assert_eq!(ping.source_id(), 0);
        assert_eq!(ping.destination_id(), 0);
    }
}
