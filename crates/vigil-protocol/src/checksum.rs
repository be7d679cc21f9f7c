//! Frame checksum.
//!
//! CRC-16/X-25 (ISO 3309 HDLC): polynomial 0x1021, reflected, initial
//! value and final XOR 0xFFFF. Computed over header bytes 2..16 followed by
//! the frame payload, i.e. every byte of the frame except the checksum
//! field itself.

use crc::{CRC_16_IBM_SDLC, Crc};

use crate::HEADER_SIZE;

const X25: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_SDLC);

/// Computes the checksum of a frame from its raw header and payload.
///
/// The first two header bytes (the checksum field) are not covered, so
/// the result does not depend on what they currently hold.
pub fn frame_checksum(header: &[u8; HEADER_SIZE], payload: &[u8]) -> u16 {
    let mut digest = X25.digest();
    digest.update(&header[2..]);
    digest.update(payload);
    digest.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_x25_check_value() {
        assert_eq!(X25.checksum(b"123456789"), 0x906E);
    }

    #[test]
    fn test_checksum_ignores_checksum_field() {
        let mut header = [7u8; HEADER_SIZE];
        let a = frame_checksum(&header, b"payload");
        header[0] = 0;
        header[1] = 0;
        assert_eq!(frame_checksum(&header, b"payload"), a);
    }

    #[test]
    fn test_checksum_covers_header_and_payload() {
        let header = [0u8; HEADER_SIZE];
        let base = frame_checksum(&header, b"abc");

        let mut touched = header;
        touched[15] = 1;
        assert_ne!(frame_checksum(&touched, b"abc"), base);
        assert_ne!(frame_checksum(&header, b"abd"), base);
    }

    #[test]
    fn test_checksum_is_split_invariant() {
        let mut header = [0u8; HEADER_SIZE];
        header[2..].copy_from_slice(b"fourteen bytes");
        let mut joined = b"fourteen bytes".to_vec();
        joined.extend_from_slice(b"and a body");
        assert_eq!(frame_checksum(&header, b"and a body"), X25.checksum(&joined));
    }
}
