//! Control events of the protocol itself.
//!
//! These live in the reserved category `0xFFFF`. They are registered by
//! every [`EventCodec`](crate::EventCodec) on its own, so user registries
//! never need to know about them, and streams consume them instead of
//! handing them to callers.

use vigil_events::{Event, EventError, EventType, Field, Registry};

use crate::ProtocolError;

/// Category reserved for protocol control events.
pub const INTERNAL_CATEGORY: u16 = 0xFFFF;

/// Identifies a [`Raw`] payload. Raw payloads are never framed.
pub const RAW: EventType = EventType::new(INTERNAL_CATEGORY, 0);

/// Identifies the [`VersionResponse`] negotiation record.
pub const VERSION_RESPONSE: EventType = EventType::new(INTERNAL_CATEGORY, 1);

/// Identifies an [`Ack`].
pub const ACK: EventType = EventType::new(INTERNAL_CATEGORY, 2);

/// Magic number opening every negotiation record ("VGIL").
pub const PROTOCOL_MAGIC: u32 = 0x5647_494C;

pub const PROTOCOL_MAJOR: u16 = 2;
pub const PROTOCOL_MINOR: u16 = 0;
pub const PROTOCOL_PATCH: u16 = 0;

bitflags::bitflags! {
    /// Optional protocol features a peer can advertise.
    ///
    /// The set a stream actually uses is the intersection of what both
    /// peers advertised.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Extensions: u32 {
        /// Compress everything after the handshake.
        const COMPRESSION = 1 << 0;
        /// Stop framing after the handshake, exchange opaque bytes.
        const COARSE = 1 << 1;
    }
}

/// The negotiation record, sent once per direction at stream start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionResponse {
    pub magic: u32,
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    pub extensions: u32,
}

impl VersionResponse {
    /// A record for this protocol version advertising `extensions`.
    pub fn new(extensions: Extensions) -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            major: PROTOCOL_MAJOR,
            minor: PROTOCOL_MINOR,
            patch: PROTOCOL_PATCH,
            extensions: extensions.bits(),
        }
    }

    /// The advertised extensions. Bits this side does not know are
    /// dropped.
    pub fn extensions(&self) -> Extensions {
        Extensions::from_bits_truncate(self.extensions)
    }

    /// Checks that the peer speaks a compatible protocol.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::VersionMismatch`] on a wrong magic or a
    /// different major version. Minor and patch may differ.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.magic != PROTOCOL_MAGIC || self.major != PROTOCOL_MAJOR {
            return Err(ProtocolError::VersionMismatch {
                magic: self.magic,
                major: self.major,
                minor: self.minor,
                patch: self.patch,
            });
        }
        Ok(())
    }

    /// The mismatch to report for a negotiation record whose body does not
    /// parse. Whatever version fields the body is long enough to carry are
    /// reported; the rest read as zero.
    pub fn unreadable(body: &[u8]) -> ProtocolError {
        let word = |at: usize, len: usize| {
            body.get(at..at + len)
                .map_or(0, |bytes| bytes.iter().fold(0u32, |acc, &b| acc << 8 | u32::from(b)))
        };
        ProtocolError::VersionMismatch {
            magic: word(0, 4),
            major: word(4, 2) as u16,
            minor: word(6, 2) as u16,
            patch: word(8, 2) as u16,
        }
    }
}

impl Default for VersionResponse {
    fn default() -> Self {
        Self::new(Extensions::empty())
    }
}

impl Event for VersionResponse {
    fn event_type(&self) -> EventType {
        VERSION_RESPONSE
    }
}

/// Tells the peer how many of its events were processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ack {
    pub acknowledged_events: u32,
}

impl Ack {
    pub fn new(acknowledged_events: u32) -> Self {
        Self {
            acknowledged_events,
        }
    }
}

impl Event for Ack {
    fn event_type(&self) -> EventType {
        ACK
    }
}

/// Opaque bytes exchanged on a coarse stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Raw {
    pub data: Vec<u8>,
}

impl Raw {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }
}

impl Event for Raw {
    fn event_type(&self) -> EventType {
        RAW
    }
}

/// Registers the framed control events in `registry`.
pub(crate) fn register_internal(registry: &mut Registry) -> Result<(), EventError> {
    registry.register(
        VERSION_RESPONSE,
        "version_response",
        || Box::new(VersionResponse::default()),
        vec![
            Field::uint::<VersionResponse>("magic", |e| e.magic, |e, v| e.magic = v),
            Field::short::<VersionResponse>("major", |e| e.major, |e, v| e.major = v),
            Field::short::<VersionResponse>("minor", |e| e.minor, |e, v| e.minor = v),
            Field::short::<VersionResponse>("patch", |e| e.patch, |e, v| e.patch = v),
            Field::uint::<VersionResponse>(
                "extensions",
                |e| e.extensions,
                |e, v| e.extensions = v,
            ),
        ],
    )?;
    registry.register(
        ACK,
        "ack",
        || Box::new(Ack::default()),
        vec![Field::uint::<Ack>(
            "acknowledged_events",
            |e| e.acknowledged_events,
            |e, v| e.acknowledged_events = v,
        )],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_response_carries_current_version() {
        let record = VersionResponse::new(Extensions::COMPRESSION);
        assert_eq!(record.magic, PROTOCOL_MAGIC);
        assert_eq!((record.major, record.minor, record.patch), (2, 0, 0));
        assert_eq!(record.extensions(), Extensions::COMPRESSION);
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_wrong_magic_or_major_is_a_mismatch() {
        let mut record = VersionResponse::default();
        record.magic = 0xDEAD_BEEF;
        assert!(matches!(
            record.validate(),
            Err(ProtocolError::VersionMismatch { magic: 0xDEAD_BEEF, .. })
        ));

        let mut record = VersionResponse::default();
        record.major = 1;
        assert!(matches!(
            record.validate(),
            Err(ProtocolError::VersionMismatch { major: 1, .. })
        ));
    }

    #[test]
    fn test_unreadable_record_reports_what_it_carries() {
        assert!(matches!(
            VersionResponse::unreadable(&[0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01]),
            ProtocolError::VersionMismatch {
                magic: 0xDEAD_BEEF,
                major: 1,
                minor: 0,
                patch: 0,
            }
        ));
        assert!(matches!(
            VersionResponse::unreadable(&[0x56, 0x47]),
            ProtocolError::VersionMismatch {
                magic: 0,
                major: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_minor_difference_is_accepted() {
        let mut record = VersionResponse::default();
        record.minor = 9;
        record.patch = 3;
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_unknown_extension_bits_are_ignored() {
        let mut record = VersionResponse::default();
        record.extensions = 0xFFFF_FFFF;
        assert_eq!(record.extensions(), Extensions::all());
    }

    #[test]
    fn test_internal_types_register_once() {
        let mut registry = Registry::new();
        register_internal(&mut registry).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(VERSION_RESPONSE));
        assert!(registry.contains(ACK));
        assert!(!registry.contains(RAW));
        assert!(register_internal(&mut registry).is_err());
    }

    #[test]
    fn test_version_response_body_is_fourteen_bytes() {
        let mut registry = Registry::new();
        register_internal(&mut registry).unwrap();
        let body = registry.serialize(&VersionResponse::default()).unwrap();
        assert_eq!(body.len(), 4 + 2 + 2 + 2 + 4);
        assert_eq!(&body[..4], b"VGIL");
    }
}
