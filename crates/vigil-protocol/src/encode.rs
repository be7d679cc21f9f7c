//! Write path: splitting an event body into frames.

use serde::{Deserialize, Serialize};

use crate::{CHUNK_SENTINEL, FrameHeader, FrameIdentity, MAX_CHUNK_SIZE};

/// How the end of a body whose length is a nonzero multiple of 65535 is
/// marked on the wire.
///
/// Such a body fills its last chunk exactly, so its last frame carries the
/// continuation sentinel like every other. Both ends of a stream must use
/// the same policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkTermination {
    /// Follow the last full chunk with a zero-length frame.
    ///
    /// An event is complete exactly when a frame without the sentinel
    /// arrives, so the decoder never has to guess.
    #[default]
    EmptyFrame,

    /// Emit no terminator.
    ///
    /// The decoder completes a sentinel-terminated event when the next
    /// valid frame has a different identity, or at end of stream. Two
    /// back-to-back events with the same identity whose first body is an
    /// exact multiple of 65535 are indistinguishable from one event under
    /// this policy.
    Implicit,
}

/// Appends one sealed frame to `out`.
pub fn write_frame(out: &mut Vec<u8>, identity: FrameIdentity, chunk_size: u16, payload: &[u8]) {
    let mut header = FrameHeader::new(identity, chunk_size);
    header.seal(payload);
    out.reserve(header.frame_len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(payload);
}

/// Splits `body` into frames and appends them to `out`.
///
/// Every chunk but the last is exactly 65535 bytes and carries the
/// sentinel. The last carries the true remaining length, which may be 0:
/// an empty body is still one frame. Returns the number of frames written.
pub fn encode_frames(
    out: &mut Vec<u8>,
    identity: FrameIdentity,
    body: &[u8],
    termination: ChunkTermination,
) -> usize {
    let mut rest = body;
    let mut frames = 0;
    while rest.len() >= MAX_CHUNK_SIZE {
        let (chunk, tail) = rest.split_at(MAX_CHUNK_SIZE);
        write_frame(out, identity, CHUNK_SENTINEL, chunk);
        frames += 1;
        rest = tail;
        if rest.is_empty() && termination == ChunkTermination::Implicit {
            return frames;
        }
    }
    write_frame(out, identity, rest.len() as u16, rest);
    frames + 1
}

#[cfg(test)]
mod tests {
    use vigil_events::EventType;

    use super::*;
    use crate::HEADER_SIZE;

    fn identity() -> FrameIdentity {
        FrameIdentity::new(EventType::new(1, 2), 3, 4)
    }

    fn chunk_sizes(bytes: &[u8]) -> Vec<u16> {
        let mut sizes = Vec::new();
        let mut rest = bytes;
        while !rest.is_empty() {
            let mut raw = [0u8; HEADER_SIZE];
            raw.copy_from_slice(&rest[..HEADER_SIZE]);
            let header = FrameHeader::parse(&raw);
            sizes.push(header.chunk_size);
            rest = &rest[header.frame_len()..];
        }
        sizes
    }

    fn encode(len: usize, termination: ChunkTermination) -> (Vec<u8>, usize) {
        let mut out = Vec::new();
        let frames = encode_frames(&mut out, identity(), &vec![0xA5; len], termination);
        (out, frames)
    }

    #[test]
    fn test_empty_body_is_one_header_only_frame() {
        let (out, frames) = encode(0, ChunkTermination::EmptyFrame);
        assert_eq!(frames, 1);
        assert_eq!(out.len(), HEADER_SIZE);
        assert_eq!(chunk_sizes(&out), [0]);
    }

    #[test]
    fn test_small_body_is_one_frame() {
        let (out, frames) = encode(260, ChunkTermination::EmptyFrame);
        assert_eq!(frames, 1);
        assert_eq!(out.len(), 276);
        assert_eq!(&out[2..4], &[0x01, 0x04]);
    }

    #[test]
    fn test_large_body_splits_at_65535() {
        let (out, frames) = encode(70_253, ChunkTermination::EmptyFrame);
        assert_eq!(frames, 2);
        assert_eq!(out.len(), 16 + 65_535 + 16 + 4_718);
        assert_eq!(chunk_sizes(&out), [0xFFFF, 4_718]);
    }

    #[test]
    fn test_exact_multiple_with_empty_terminator() {
        let (out, frames) = encode(65_535, ChunkTermination::EmptyFrame);
        assert_eq!(frames, 2);
        assert_eq!(chunk_sizes(&out), [0xFFFF, 0]);

        let (out, _) = encode(2 * 65_535, ChunkTermination::EmptyFrame);
        assert_eq!(chunk_sizes(&out), [0xFFFF, 0xFFFF, 0]);
    }

    #[test]
    fn test_exact_multiple_with_implicit_termination() {
        let (out, frames) = encode(65_535, ChunkTermination::Implicit);
        assert_eq!(frames, 1);
        assert_eq!(out.len(), HEADER_SIZE + 65_535);
        assert_eq!(chunk_sizes(&out), [0xFFFF]);
    }

    #[test]
    fn test_frame_count_matches_ceiling_under_implicit() {
        for len in [0, 1, 65_534, 65_535, 65_536, 131_070, 131_071, 200_000] {
            let (out, frames) = encode(len, ChunkTermination::Implicit);
            assert_eq!(frames, len.max(1).div_ceil(65_535), "len {len}");
            let sizes = chunk_sizes(&out);
            let last = *sizes.last().unwrap() as usize;
            let expected = if len > 0 && len % 65_535 == 0 { 65_535 } else { len % 65_535 };
            assert_eq!(last, expected, "len {len}");
        }
    }

    #[test]
    fn test_every_frame_is_sealed() {
        let (out, _) = encode(70_000, ChunkTermination::EmptyFrame);
        let mut rest = out.as_slice();
        while !rest.is_empty() {
            let mut raw = [0u8; HEADER_SIZE];
            raw.copy_from_slice(&rest[..HEADER_SIZE]);
            let header = FrameHeader::parse(&raw);
            assert!(header.verify(&rest[HEADER_SIZE..header.frame_len()]));
            assert_eq!(header.identity(), identity());
            rest = &rest[header.frame_len()..];
        }
    }

    #[test]
    fn test_termination_serde_names() {
        assert_eq!(
            serde_json::to_string(&ChunkTermination::EmptyFrame).unwrap(),
            "\"empty_frame\""
        );
        let parsed: ChunkTermination = serde_json::from_str("\"implicit\"").unwrap();
        assert_eq!(parsed, ChunkTermination::Implicit);
    }
}
