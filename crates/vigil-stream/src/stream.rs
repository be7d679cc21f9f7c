//! The stream facade: typed events in and out of one connection.
//!
//! A [`FramedStream`] owns one connection (wrapped in a compression filter
//! that starts switched off), one [`EventCodec`] and one [`FrameDecoder`].
//! Its life has two phases:
//!
//! ```text
//!   new ──(negotiate)──→ framed ──(peer closes)──→ closed
//!    │                     │
//!    │                     └──(both advertised COARSE)──→ coarse
//!    └──(config.coarse)──────────────────────────────────→ coarse
//! ```
//!
//! Negotiation happens once. Calling [`read`](FramedStream::read) or
//! [`write`](FramedStream::write) before [`negotiate`](FramedStream::negotiate)
//! negotiates as the responder first.
//!
//! Every method takes `&mut self`: a stream has exactly one logical user
//! at a time, and the codec state inside it needs no locking.

use std::sync::Arc;
use std::time::Instant;

use vigil_events::{Event, Registry};
use vigil_protocol::{
    Ack, DecoderState, EventCodec, Extensions, FrameDecoder, INTERNAL_CATEGORY, ProtocolError,
    Raw, VERSION_RESPONSE, VersionResponse,
};
use vigil_transport::{Connection, ConnectionId, Statistics, ZlibFilter};

use crate::{Role, StreamConfig, StreamError};

/// A negotiated, framed event stream over a connection.
pub struct FramedStream<C> {
    conn: ZlibFilter<C>,
    codec: EventCodec,
    decoder: FrameDecoder,
    config: StreamConfig,
    negotiated: Option<Extensions>,
    coarse: bool,
    eof: bool,
    /// Raw bytes read during the handshake that belong to a coarse stream.
    raw_backlog: Vec<u8>,
    /// Events received since the last acknowledgement we sent.
    unacknowledged: u32,
    /// Acknowledgements received from the peer, not yet reported.
    acknowledged: u32,
    scratch: Vec<u8>,
}

impl<C: Connection> FramedStream<C> {
    /// Wraps `conn` in a stream that resolves event types through
    /// `registry`.
    ///
    /// Nothing is sent until the first call to `negotiate`, `read` or
    /// `write`.
    pub fn new(conn: C, registry: Arc<Registry>, config: StreamConfig) -> Self {
        let codec = EventCodec::new(registry)
            .with_termination(config.termination)
            .with_max_event_size(config.max_event_size);
        let decoder = codec.decoder();
        let conn = ZlibFilter::passthrough(conn, config.compression_level, config.compression_buffer);

        let (negotiated, coarse) = if config.coarse {
            (Some(Extensions::COARSE), true)
        } else if !config.negotiate {
            (Some(Extensions::empty()), false)
        } else {
            (None, false)
        };

        Self {
            conn,
            codec,
            decoder,
            config,
            negotiated,
            coarse,
            eof: false,
            raw_backlog: Vec::new(),
            unacknowledged: 0,
            acknowledged: 0,
            scratch: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Negotiation
    // -----------------------------------------------------------------------

    /// Performs the handshake and returns the effective extension set.
    ///
    /// The initiator sends its record then waits for the peer's; the
    /// responder does the opposite. The effective set is the intersection
    /// of both advertisements. Once negotiated, further calls return the
    /// same set without touching the wire.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::Incomplete`] if the peer closes first.
    /// - [`ProtocolError::HandshakeTimeout`] if its record does not arrive
    ///   within `handshake_timeout`.
    /// - [`ProtocolError::VersionMismatch`] on a wrong magic or major.
    /// - [`ProtocolError::InvalidMessage`] if the first event is not a
    ///   negotiation record.
    pub async fn negotiate(&mut self, role: Role) -> Result<Extensions, StreamError> {
        if let Some(extensions) = self.negotiated {
            return Ok(extensions);
        }
        let local = self.config.advertised();
        let deadline = Instant::now() + self.config.handshake_timeout;
        tracing::debug!(id = %self.conn.id(), ?role, advertised = ?local, "negotiating");

        let peer = match role {
            Role::Initiator => {
                self.send_version(local).await?;
                self.receive_version(deadline).await?
            }
            Role::Responder => {
                let peer = self.receive_version(deadline).await?;
                self.send_version(local).await?;
                peer
            }
        };

        let effective = local & peer;
        self.apply(effective).await;
        self.negotiated = Some(effective);
        tracing::info!(
            id = %self.conn.id(),
            ?role,
            extensions = ?effective,
            "negotiation complete"
        );
        Ok(effective)
    }

    async fn send_version(&mut self, extensions: Extensions) -> Result<(), StreamError> {
        self.send_event(&VersionResponse::new(extensions)).await?;
        self.conn.flush().await?;
        Ok(())
    }

    async fn receive_version(&mut self, deadline: Instant) -> Result<Extensions, StreamError> {
        loop {
            while let Some(decoded) = self.decoder.decode(self.eof) {
                let unreadable = (decoded.identity.event_type == VERSION_RESPONSE)
                    .then(|| VersionResponse::unreadable(&decoded.body));
                let Some(event) = self.codec.decode_event(decoded) else {
                    if let Some(e) = unreadable {
                        tracing::error!(
                            id = %self.conn.id(),
                            error = %e,
                            "unreadable negotiation record"
                        );
                        return Err(e.into());
                    }
                    continue;
                };
                let Some(record) = event.downcast_ref::<VersionResponse>() else {
                    return Err(ProtocolError::InvalidMessage(format!(
                        "expected a negotiation record, got event type {}",
                        event.event_type()
                    ))
                    .into());
                };
                if let Err(e) = record.validate() {
                    tracing::error!(id = %self.conn.id(), error = %e, "peer rejected");
                    return Err(e.into());
                }
                tracing::debug!(
                    id = %self.conn.id(),
                    major = record.major,
                    minor = record.minor,
                    patch = record.patch,
                    extensions = ?record.extensions(),
                    "received negotiation record"
                );
                return Ok(record.extensions());
            }
            if self.eof {
                return Err(ProtocolError::Incomplete.into());
            }
            if !self.fill(Some(deadline)).await? {
                return Err(ProtocolError::HandshakeTimeout.into());
            }
        }
    }

    /// Switches the stream to the agreed extensions.
    ///
    /// Bytes already buffered by the decoder past the peer's record were
    /// produced under the new regime, so they move to whichever layer now
    /// owns them.
    async fn apply(&mut self, effective: Extensions) {
        if effective.contains(Extensions::COMPRESSION) {
            let pending = self.decoder.take_remaining();
            self.conn.enable(pending).await;
            tracing::debug!(id = %self.conn.id(), "compression enabled");
        }
        if effective.contains(Extensions::COARSE) {
            self.coarse = true;
            self.raw_backlog = self.decoder.take_remaining();
            tracing::debug!(id = %self.conn.id(), "coarse mode enabled");
        }
    }

    async fn ensure_negotiated(&mut self) -> Result<(), StreamError> {
        if self.negotiated.is_none() {
            self.negotiate(Role::Responder).await?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Read path
    // -----------------------------------------------------------------------

    /// Reads the next event.
    ///
    /// Waits until `deadline` (forever with `None`). A deadline already in
    /// the past still returns an event that is fully buffered or arrives
    /// without waiting. Returns `Ok(None)` when the deadline passes first.
    /// Control events (acknowledgements, repeated negotiation records) are
    /// handled here and never returned. On a coarse stream every call
    /// returns a [`Raw`] payload.
    ///
    /// # Errors
    ///
    /// - [`StreamError::Closed`] once the peer has closed and every
    ///   buffered event has been returned.
    /// - Transport and negotiation errors.
    pub async fn read(
        &mut self,
        deadline: Option<Instant>,
    ) -> Result<Option<Box<dyn Event>>, StreamError> {
        self.ensure_negotiated().await?;
        if self.coarse {
            return self.read_raw(deadline).await;
        }
        loop {
            while let Some(decoded) = self.decoder.decode(self.eof) {
                let Some(event) = self.codec.decode_event(decoded) else {
                    continue;
                };
                if let Some(event) = self.handle_control(event)? {
                    self.count_received().await?;
                    return Ok(Some(event));
                }
            }
            if self.eof {
                return Err(StreamError::Closed);
            }
            if !self.fill(deadline).await? {
                return Ok(None);
            }
        }
    }

    async fn read_raw(
        &mut self,
        deadline: Option<Instant>,
    ) -> Result<Option<Box<dyn Event>>, StreamError> {
        if !self.raw_backlog.is_empty() {
            let data = std::mem::take(&mut self.raw_backlog);
            return Ok(Some(Box::new(Raw::new(data))));
        }
        if self.eof {
            return Err(StreamError::Closed);
        }
        match self.receive(deadline).await? {
            Received::Data(data) => Ok(Some(Box::new(Raw::new(data)))),
            Received::Closed => {
                self.eof = true;
                Err(StreamError::Closed)
            }
            Received::TimedOut => Ok(None),
        }
    }

    /// Consumes control events. Returns the event back if it is not one.
    fn handle_control(
        &mut self,
        event: Box<dyn Event>,
    ) -> Result<Option<Box<dyn Event>>, StreamError> {
        if event.event_type().category != INTERNAL_CATEGORY {
            return Ok(Some(event));
        }
        if let Some(ack) = event.downcast_ref::<Ack>() {
            tracing::debug!(
                id = %self.conn.id(),
                count = ack.acknowledged_events,
                "peer acknowledged events"
            );
            self.acknowledged = self.acknowledged.saturating_add(ack.acknowledged_events);
        } else if let Some(record) = event.downcast_ref::<VersionResponse>() {
            record.validate()?;
            tracing::debug!(id = %self.conn.id(), "ignoring repeated negotiation record");
        }
        Ok(None)
    }

    async fn count_received(&mut self) -> Result<(), StreamError> {
        self.unacknowledged += 1;
        if self.config.ack_limit > 0 && self.unacknowledged >= self.config.ack_limit {
            self.acknowledge().await?;
        }
        Ok(())
    }

    /// Reads more bytes into the decoder.
    ///
    /// Returns `false` if `deadline` passed before anything arrived.
    async fn fill(&mut self, deadline: Option<Instant>) -> Result<bool, StreamError> {
        match self.receive(deadline).await? {
            Received::Data(bytes) => self.decoder.push(&bytes),
            Received::Closed => {
                tracing::debug!(id = %self.conn.id(), "peer closed the stream");
                self.eof = true;
            }
            Received::TimedOut => return Ok(false),
        }
        Ok(true)
    }

    async fn receive(&mut self, deadline: Option<Instant>) -> Result<Received, StreamError> {
        let received = match deadline {
            None => self.conn.recv().await?,
            Some(deadline) => {
                let deadline = tokio::time::Instant::from_std(deadline);
                match tokio::time::timeout_at(deadline, self.conn.recv()).await {
                    Ok(received) => received?,
                    Err(_) => return Ok(Received::TimedOut),
                }
            }
        };
        Ok(match received {
            Some(bytes) => Received::Data(bytes),
            None => Received::Closed,
        })
    }

    // -----------------------------------------------------------------------
    // Write path
    // -----------------------------------------------------------------------

    /// Writes one event.
    ///
    /// Returns the number of events the peer acknowledged since the
    /// previous `write` or `flush`. Acknowledgements are picked up by
    /// `read`, so a stream that never reads always returns 0.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::UnknownEventType`] for an unregistered type.
    /// - [`StreamError::CoarseWrite`] for anything but [`Raw`] on a coarse
    ///   stream.
    /// - Transport and negotiation errors.
    pub async fn write(&mut self, event: &dyn Event) -> Result<u32, StreamError> {
        self.ensure_negotiated().await?;
        if self.coarse {
            let raw = event
                .downcast_ref::<Raw>()
                .ok_or(StreamError::CoarseWrite(event.event_type()))?;
            self.conn.send(&raw.data).await?;
        } else {
            self.send_event(event).await?;
        }
        Ok(self.take_acknowledged())
    }

    async fn send_event(&mut self, event: &dyn Event) -> Result<(), StreamError> {
        self.scratch.clear();
        self.codec.encode_into(event, &mut self.scratch)?;
        self.conn.send(&self.scratch).await?;
        Ok(())
    }

    /// Pushes out anything buffered on the write side.
    ///
    /// Returns the acknowledged count like [`write`](Self::write).
    pub async fn flush(&mut self) -> Result<u32, StreamError> {
        self.conn.flush().await?;
        Ok(self.take_acknowledged())
    }

    /// Acknowledges every event received so far to the peer.
    ///
    /// Happens on its own every `ack_limit` events. Does nothing on a
    /// coarse stream or when there is nothing to acknowledge.
    pub async fn acknowledge(&mut self) -> Result<(), StreamError> {
        if self.coarse || self.unacknowledged == 0 {
            return Ok(());
        }
        let count = std::mem::take(&mut self.unacknowledged);
        self.send_event(&Ack::new(count)).await?;
        self.conn.flush().await?;
        tracing::debug!(id = %self.conn.id(), count, "sent acknowledgement");
        Ok(())
    }

    fn take_acknowledged(&mut self) -> u32 {
        std::mem::take(&mut self.acknowledged)
    }

    /// Flushes and closes the write side of the connection.
    pub async fn close(&mut self) -> Result<(), StreamError> {
        self.conn.close().await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// The effective extensions, once negotiated.
    pub fn extensions(&self) -> Option<Extensions> {
        self.negotiated
    }

    pub fn is_coarse(&self) -> bool {
        self.coarse
    }

    pub fn is_compressed(&self) -> bool {
        self.conn.is_enabled()
    }

    pub fn id(&self) -> ConnectionId {
        self.conn.id()
    }

    /// Traffic counters of the underlying connection.
    pub fn statistics(&self) -> Statistics {
        self.conn.statistics()
    }

    pub fn decoder_state(&self) -> DecoderState {
        self.decoder.state()
    }

    /// Bytes discarded while resynchronizing after corruption.
    pub fn skipped_bytes(&self) -> u64 {
        self.decoder.skipped_bytes()
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// The connection under the compression filter.
    pub fn get_ref(&self) -> &C {
        self.conn.get_ref()
    }
}

enum Received {
    Data(Vec<u8>),
    Closed,
    TimedOut,
}
