//! The fixed 16-byte frame header.
//!
//! ```text
//! offset  size  field
//! 0       2     checksum        (covers bytes 2..16 and the payload)
//! 2       2     chunk_size      (0xFFFF = full 65535-byte chunk, more follow)
//! 4       2     category
//! 6       2     element
//! 8       4     source_id
//! 12      4     destination_id
//! 16      N     payload
//! ```
//!
//! All integers are big-endian.

use bytes::{Buf, BufMut};
use vigil_events::EventType;

use crate::checksum::frame_checksum;

/// Size of a frame header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Largest payload a single frame carries.
pub const MAX_CHUNK_SIZE: usize = 0xFFFF;

/// `chunk_size` value marking a full-size chunk with more frames to follow.
pub const CHUNK_SENTINEL: u16 = 0xFFFF;

/// What ties the frames of one logical event together.
///
/// Every frame of a chunked event repeats the same identity; the decoder
/// uses it to tell a continuation from the start of an unrelated event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameIdentity {
    pub event_type: EventType,
    pub source_id: u32,
    pub destination_id: u32,
}

impl FrameIdentity {
    pub fn new(event_type: EventType, source_id: u32, destination_id: u32) -> Self {
        Self {
            event_type,
            source_id,
            destination_id,
        }
    }
}

/// A decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub checksum: u16,
    pub chunk_size: u16,
    pub event_type: EventType,
    pub source_id: u32,
    pub destination_id: u32,
}

impl FrameHeader {
    /// Creates an unsealed header (checksum 0) for a frame of `identity`.
    pub fn new(identity: FrameIdentity, chunk_size: u16) -> Self {
        Self {
            checksum: 0,
            chunk_size,
            event_type: identity.event_type,
            source_id: identity.source_id,
            destination_id: identity.destination_id,
        }
    }

    /// Reads a header from its 16-byte wire form.
    ///
    /// This never fails: any 16 bytes are a header, whether they are a
    /// *valid* one is decided by [`verify`](Self::verify).
    pub fn parse(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut buf = &bytes[..];
        Self {
            checksum: buf.get_u16(),
            chunk_size: buf.get_u16(),
            event_type: EventType::new(buf.get_u16(), buf.get_u16()),
            source_id: buf.get_u32(),
            destination_id: buf.get_u32(),
        }
    }

    /// Writes the 16-byte wire form.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        let mut buf = &mut bytes[..];
        buf.put_u16(self.checksum);
        buf.put_u16(self.chunk_size);
        buf.put_u16(self.event_type.category);
        buf.put_u16(self.event_type.element);
        buf.put_u32(self.source_id);
        buf.put_u32(self.destination_id);
        bytes
    }

    /// Number of payload bytes that follow this header.
    pub fn payload_len(&self) -> usize {
        if self.is_continuation() {
            MAX_CHUNK_SIZE
        } else {
            self.chunk_size as usize
        }
    }

    /// Total size of the frame, header included.
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + self.payload_len()
    }

    /// `true` if more frames follow for the same logical event.
    pub fn is_continuation(&self) -> bool {
        self.chunk_size == CHUNK_SENTINEL
    }

    pub fn identity(&self) -> FrameIdentity {
        FrameIdentity::new(self.event_type, self.source_id, self.destination_id)
    }

    /// Computes the checksum this header should carry for `payload`.
    pub fn compute_checksum(&self, payload: &[u8]) -> u16 {
        frame_checksum(&self.to_bytes(), payload)
    }

    /// Stores the checksum for `payload` in the header.
    pub fn seal(&mut self, payload: &[u8]) {
        self.checksum = self.compute_checksum(payload);
    }

    /// `true` if the stored checksum matches `payload`.
    pub fn verify(&self, payload: &[u8]) -> bool {
        self.checksum == self.compute_checksum(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> FrameIdentity {
        FrameIdentity::new(EventType::new(0x0102, 0x0304), 0x0506_0708, 0x090A_0B0C)
    }

    #[test]
    fn test_header_layout_is_big_endian() {
        let mut header = FrameHeader::new(identity(), 260);
        header.checksum = 0xABCD;
        assert_eq!(
            header.to_bytes(),
            [
                0xAB, 0xCD, 0x01, 0x04, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07,
                0x08, 0x09, 0x0A, 0x0B, 0x0C,
            ]
        );
    }

    #[test]
    fn test_parse_reads_what_to_bytes_wrote() {
        let mut header = FrameHeader::new(identity(), 42);
        header.seal(b"x");
        assert_eq!(FrameHeader::parse(&header.to_bytes()), header);
    }

    #[test]
    fn test_sentinel_means_full_chunk() {
        let header = FrameHeader::new(identity(), CHUNK_SENTINEL);
        assert!(header.is_continuation());
        assert_eq!(header.payload_len(), 65535);
        assert_eq!(header.frame_len(), 65551);

        let last = FrameHeader::new(identity(), 65534);
        assert!(!last.is_continuation());
        assert_eq!(last.payload_len(), 65534);
    }

    #[test]
    fn test_seal_then_verify() {
        let mut header = FrameHeader::new(identity(), 3);
        header.seal(b"abc");
        assert!(header.verify(b"abc"));
        assert!(!header.verify(b"abd"));
    }

    #[test]
    fn test_identity_round_trips() {
        let header = FrameHeader::new(identity(), 0);
        assert_eq!(header.identity(), identity());
    }
}
