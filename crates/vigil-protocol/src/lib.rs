//! Frame codec for vigil event streams.
//!
//! This crate defines how typed events travel over an unreliable byte
//! stream:
//!
//! - **Header** ([`FrameHeader`]): the fixed 16-byte record in front of
//!   every chunk of payload, sealed with a CRC-16 checksum.
//! - **Encoder** ([`encode_frames`]): splits a body of any size into
//!   frames of at most 65535 payload bytes.
//! - **Decoder** ([`scan`], [`FrameDecoder`]): finds checksum-valid frames,
//!   resynchronizes byte by byte after corruption, reassembles chunks.
//! - **Control events** ([`VersionResponse`], [`Ack`], [`Raw`]): the
//!   negotiation record, acknowledgements and coarse-mode payloads.
//! - **Codec** ([`EventCodec`]): registry lookups on both paths.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer sits between the registry (event bodies) and the
//! stream (transport and negotiation). It does no I/O: it only turns
//! events into bytes and bytes into events.
//!
//! ```text
//! Registry (body) → Protocol (frames) → Stream (transport)
//! ```

mod checksum;
mod codec;
mod decode;
mod encode;
mod error;
mod header;
mod internal;

pub use checksum::frame_checksum;
pub use codec::EventCodec;
pub use decode::{DEFAULT_MAX_EVENT_SIZE, DecodedEvent, DecoderState, FrameDecoder, Scan, scan};
pub use encode::{ChunkTermination, encode_frames, write_frame};
pub use error::ProtocolError;
pub use header::{CHUNK_SENTINEL, FrameHeader, FrameIdentity, HEADER_SIZE, MAX_CHUNK_SIZE};
pub use internal::{
    ACK, Ack, Extensions, INTERNAL_CATEGORY, PROTOCOL_MAGIC, PROTOCOL_MAJOR, PROTOCOL_MINOR,
    PROTOCOL_PATCH, RAW, Raw, VERSION_RESPONSE, VersionResponse,
};
