//! Stream configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use vigil_protocol::{ChunkTermination, DEFAULT_MAX_EVENT_SIZE, Extensions};

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Which side of the handshake a stream plays.
///
/// The initiator speaks first; the responder waits for the initiator's
/// record before sending its own. Usually the connecting side initiates
/// and the accepting side responds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Initiator,
    Responder,
}

// ---------------------------------------------------------------------------
// StreamConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`FramedStream`](crate::FramedStream).
///
/// Missing fields take their default when deserialized, so a config file
/// only has to mention what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Exchange negotiation records before any event.
    ///
    /// Both peers must agree on this; with it off the stream starts
    /// framing immediately with no extensions.
    pub negotiate: bool,

    /// Advertise compression during negotiation.
    pub compression: bool,

    /// zlib level (0–9) used once compression is on.
    pub compression_level: u32,

    /// Bytes accumulated before a compressed block is emitted.
    ///
    /// 0 emits a block on every write.
    pub compression_buffer: usize,

    /// Start in coarse mode: no handshake, no framing, raw bytes only.
    pub coarse: bool,

    /// Advertise coarse mode during negotiation.
    ///
    /// If both peers advertise it the stream carries raw bytes after the
    /// handshake.
    pub advertise_coarse: bool,

    /// How long to wait for the peer's negotiation record.
    pub handshake_timeout: Duration,

    /// Send an acknowledgement to the peer after this many received
    /// events. 0 disables automatic acknowledgements.
    pub ack_limit: u32,

    /// How bodies that are an exact multiple of 65535 bytes end.
    pub termination: ChunkTermination,

    /// Largest event body accepted on read.
    pub max_event_size: usize,
}

impl StreamConfig {
    /// The extension set this side advertises.
    pub fn advertised(&self) -> Extensions {
        let mut extensions = Extensions::empty();
        if self.compression {
            extensions |= Extensions::COMPRESSION;
        }
        if self.advertise_coarse {
            extensions |= Extensions::COARSE;
        }
        extensions
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            negotiate: true,
            compression: false,
            compression_level: 6,
            compression_buffer: 0,
            coarse: false,
            advertise_coarse: false,
            handshake_timeout: Duration::from_secs(5),
            ack_limit: 1000,
            termination: ChunkTermination::EmptyFrame,
            max_event_size: DEFAULT_MAX_EVENT_SIZE,
        }
    }
}
