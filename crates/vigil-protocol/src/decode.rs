//! Read path: finding valid frames in a byte stream and reassembling them
//! into event bodies.
//!
//! Corruption is part of normal operation here, not an error. Frames come
//! off best-effort transports (files cut short by a crash, sockets reset
//! mid-write), so the decoder never gives up on a stream: when the bytes
//! under the cursor do not form a checksum-valid frame it moves forward by
//! one byte and tries again. It cannot trust the damaged frame's length
//! field, so it cannot skip the damaged frame as a whole.
//!
//! [`scan`] holds that search and is the only place doing offset
//! arithmetic. [`FrameDecoder`] owns the buffer and the reassembly state
//! on top of it.

use bytes::{Buf, BytesMut};

use crate::{ChunkTermination, FrameHeader, FrameIdentity, HEADER_SIZE};

/// Default cap on the size of one reassembled event body (64 MiB).
pub const DEFAULT_MAX_EVENT_SIZE: usize = 64 * 1024 * 1024;

/// Outcome of one [`scan`] over a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// A checksum-valid frame starts `skipped` bytes into the buffer and is
    /// entirely buffered.
    Found { skipped: usize, header: FrameHeader },

    /// No frame can be confirmed yet. The first `skipped` bytes can never
    /// start one; at least `needed` more bytes must arrive before the
    /// earliest unfinished candidate, at `skipped`, can be judged. Only
    /// returned before end of stream.
    Incomplete { skipped: usize, needed: usize },

    /// End of stream and no valid frame starts anywhere in the buffer.
    Exhausted,
}

/// Searches `buf` for the first checksum-valid frame.
///
/// Candidates are tried at every offset, one byte apart. A candidate whose
/// payload is not fully buffered cannot be judged yet, and its length
/// field may be damaged, so the search remembers the earliest such
/// candidate and keeps going: a complete valid frame further on is
/// returned at once. Only when none exists is the earliest unfinished
/// candidate waited for (`eof == false`). Once the stream has ended an
/// unfinished candidate can never complete and is passed over like a
/// checksum failure.
pub fn scan(buf: &[u8], eof: bool) -> Scan {
    rescan(buf, eof, 0)
}

/// [`scan`] over a buffer whose complete candidates ending within the
/// first `verified` bytes are already known to fail their checksum.
fn rescan(buf: &[u8], eof: bool, verified: usize) -> Scan {
    let mut waiting = None;
    let mut pos = 0;
    while buf.len() - pos >= HEADER_SIZE {
        let mut raw = [0u8; HEADER_SIZE];
        raw.copy_from_slice(&buf[pos..pos + HEADER_SIZE]);
        let header = FrameHeader::parse(&raw);
        let end = pos + header.frame_len();
        if end > buf.len() {
            if !eof && waiting.is_none() {
                waiting = Some((pos, end - buf.len()));
            }
        } else if end > verified && header.verify(&buf[pos + HEADER_SIZE..end]) {
            return Scan::Found {
                skipped: pos,
                header,
            };
        }
        pos += 1;
    }
    match waiting {
        Some((skipped, needed)) => Scan::Incomplete { skipped, needed },
        None if eof => Scan::Exhausted,
        None => Scan::Incomplete {
            skipped: pos,
            needed: HEADER_SIZE - (buf.len() - pos),
        },
    }
}

/// Where the decoder stands, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Looking for a plausible header.
    Scanning,
    /// A header candidate is buffered; its payload is not complete yet.
    AwaitingPayload,
    /// One or more chunks of the current event have been accepted.
    Reassembling,
    /// The last call produced a complete event body.
    Done,
}

/// A complete event body together with the identity its frames carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEvent {
    pub identity: FrameIdentity,
    pub body: Vec<u8>,
}

#[derive(Debug)]
struct Pending {
    identity: FrameIdentity,
    body: Vec<u8>,
    oversized: bool,
}

impl Pending {
    fn new(identity: FrameIdentity) -> Self {
        Self {
            identity,
            body: Vec::new(),
            oversized: false,
        }
    }
}

/// Incremental frame decoder.
///
/// Feed it bytes with [`push`](Self::push) in whatever pieces the transport
/// delivers them, and call [`decode`](Self::decode) to pull out complete
/// event bodies in arrival order.
///
/// ```rust
/// use vigil_events::EventType;
/// use vigil_protocol::{ChunkTermination, FrameDecoder, FrameIdentity, encode_frames};
///
/// let identity = FrameIdentity::new(EventType::new(1, 1), 0, 0);
/// let mut wire = Vec::new();
/// encode_frames(&mut wire, identity, b"hello", ChunkTermination::EmptyFrame);
///
/// let mut decoder = FrameDecoder::new(ChunkTermination::EmptyFrame);
/// decoder.push(&wire[..10]);
/// assert!(decoder.decode(false).is_none());
/// decoder.push(&wire[10..]);
/// assert_eq!(decoder.decode(false).unwrap().body, b"hello");
/// ```
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    termination: ChunkTermination,
    max_event_size: usize,
    pending: Option<Pending>,
    state: DecoderState,
    skipped_bytes: u64,
    // Length of the buffer prefix searched by the last unsuccessful scan.
    verified: usize,
}

impl FrameDecoder {
    /// Creates a decoder with the default maximum event size.
    pub fn new(termination: ChunkTermination) -> Self {
        Self::with_max_event_size(termination, DEFAULT_MAX_EVENT_SIZE)
    }

    /// Creates a decoder that abandons any event whose body would grow
    /// beyond `max_event_size` bytes.
    pub fn with_max_event_size(termination: ChunkTermination, max_event_size: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            termination,
            max_event_size,
            pending: None,
            state: DecoderState::Scanning,
            skipped_bytes: 0,
            verified: 0,
        }
    }

    /// Appends bytes received from the transport.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Number of bytes buffered but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Total bytes discarded by resynchronization so far.
    pub fn skipped_bytes(&self) -> u64 {
        self.skipped_bytes
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn termination(&self) -> ChunkTermination {
        self.termination
    }

    /// Takes every buffered, unconsumed byte out of the decoder.
    ///
    /// Used when the stream stops speaking frames (compression switched on,
    /// or coarse mode) and the bytes already read belong to the next layer.
    pub fn take_remaining(&mut self) -> Vec<u8> {
        self.state = DecoderState::Scanning;
        self.verified = 0;
        self.buffer.split().to_vec()
    }

    /// Returns the next complete event body, if the buffer holds one.
    ///
    /// Pass `eof = true` once the transport reported the peer closed: the
    /// decoder then stops waiting for frames that can no longer complete,
    /// drops trailing garbage, and (under [`ChunkTermination::Implicit`])
    /// releases an event still waiting for its terminator.
    pub fn decode(&mut self, eof: bool) -> Option<DecodedEvent> {
        loop {
            match rescan(&self.buffer, eof, self.verified) {
                Scan::Incomplete { skipped, .. } => {
                    self.skip(skipped);
                    self.verified = self.buffer.len();
                    self.state = if self.pending.is_some() {
                        DecoderState::Reassembling
                    } else if self.buffer.len() >= HEADER_SIZE {
                        DecoderState::AwaitingPayload
                    } else {
                        DecoderState::Scanning
                    };
                    return None;
                }
                Scan::Exhausted => return self.finish(),
                Scan::Found { skipped, header } => {
                    self.skip(skipped);
                    self.verified = 0;
                    if let Some(done) = self.check_identity(header.identity()) {
                        return Some(done);
                    }
                    let frame = self.buffer.split_to(header.frame_len());
                    if let Some(done) = self.accept(&header, &frame[HEADER_SIZE..]) {
                        return Some(done);
                    }
                }
            }
        }
    }

    fn skip(&mut self, skipped: usize) {
        if skipped == 0 {
            return;
        }
        tracing::debug!(skipped, "frame header integrity check failed, resynchronized");
        self.buffer.advance(skipped);
        self.skipped_bytes += skipped as u64;
    }

    /// Deals with a valid frame that does not continue the pending event.
    ///
    /// Under `Implicit` the pending event was complete after all and is
    /// returned, leaving the new frame in the buffer for the next call.
    fn check_identity(&mut self, identity: FrameIdentity) -> Option<DecodedEvent> {
        let pending = self.pending.as_ref()?;
        if pending.identity == identity {
            return None;
        }
        let pending = self.pending.take()?;
        match self.termination {
            ChunkTermination::Implicit => self.complete(pending),
            ChunkTermination::EmptyFrame => {
                tracing::warn!(
                    event_type = %pending.identity.event_type,
                    bytes = pending.body.len(),
                    "discarding partially reassembled event, frame of another event arrived"
                );
                None
            }
        }
    }

    fn accept(&mut self, header: &FrameHeader, payload: &[u8]) -> Option<DecodedEvent> {
        let mut pending = self
            .pending
            .take()
            .unwrap_or_else(|| Pending::new(header.identity()));
        if !pending.oversized {
            if pending.body.len() + payload.len() > self.max_event_size {
                tracing::warn!(
                    event_type = %pending.identity.event_type,
                    limit = self.max_event_size,
                    "event exceeds maximum size, discarding it"
                );
                pending.oversized = true;
                pending.body = Vec::new();
            } else {
                pending.body.extend_from_slice(payload);
            }
        }
        if header.is_continuation() {
            self.pending = Some(pending);
            self.state = DecoderState::Reassembling;
            return None;
        }
        self.complete(pending)
    }

    fn complete(&mut self, pending: Pending) -> Option<DecodedEvent> {
        if pending.oversized {
            self.state = DecoderState::Scanning;
            return None;
        }
        self.state = DecoderState::Done;
        Some(DecodedEvent {
            identity: pending.identity,
            body: pending.body,
        })
    }

    /// End of stream with no further valid frame in the buffer.
    fn finish(&mut self) -> Option<DecodedEvent> {
        if !self.buffer.is_empty() {
            tracing::debug!(
                bytes = self.buffer.len(),
                "dropping truncated data at end of stream"
            );
            self.skipped_bytes += self.buffer.len() as u64;
            self.buffer.clear();
        }
        self.verified = 0;
        self.state = DecoderState::Scanning;
        let pending = self.pending.take()?;
        match self.termination {
            ChunkTermination::Implicit => self.complete(pending),
            ChunkTermination::EmptyFrame => {
                tracing::warn!(
                    event_type = %pending.identity.event_type,
                    bytes = pending.body.len(),
                    "discarding partially reassembled event at end of stream"
                );
                None
            }
        }
    }
}
