//! Byte transport layer for vigil.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! the duplex byte channels the frame codec is layered on. A connection
//! moves opaque bytes; it knows nothing about frames or events.
//!
//! Concrete connections:
//!
//! - [`MemoryConnection`]: an in-process pair, for tests and local relays
//! - [`TcpConnection`] / [`TcpTransport`]: plain TCP (feature `tcp`)
//! - [`ZlibFilter`]: a compression filter wrapping any other connection
//!   (feature `zlib`)
//!
//! # Feature Flags
//!
//! - `tcp` (default): TCP transport via `tokio::net`
//! - `zlib` (default): compression filter via `flate2`

#![allow(async_fn_in_trait)]

mod error;
mod memory;
mod stats;
#[cfg(feature = "tcp")]
mod tcp;
#[cfg(feature = "zlib")]
mod zlib;

pub use error::TransportError;
pub use memory::MemoryConnection;
pub use stats::{Counters, Statistics};
#[cfg(feature = "tcp")]
pub use tcp::{TcpConnection, TcpTransport};
#[cfg(feature = "zlib")]
pub use zlib::ZlibFilter;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating unique connection IDs across all transports.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next process-unique identifier.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, TransportError>;

    /// Gracefully shuts down the transport, stopping new connections.
    async fn shutdown(&self) -> Result<(), TransportError>;
}

/// A single duplex byte channel.
///
/// All methods take `&self`; implementations keep their halves behind
/// async mutexes so a reader and a writer never contend on the same lock.
pub trait Connection: Send + Sync + 'static {
    /// Sends the whole buffer to the remote peer.
    ///
    /// Partial writes are retried internally; the call only returns once
    /// every byte was accepted or the transport failed.
    async fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Receives the next chunk of bytes from the remote peer.
    ///
    /// Returns `Ok(None)` when the peer closed the connection. Chunk
    /// boundaries carry no meaning.
    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError>;

    /// Pushes out anything the connection buffered on the write side.
    async fn flush(&self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Closes the write side of the connection.
    async fn close(&self) -> Result<(), TransportError>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// Returns a snapshot of this connection's traffic counters.
    fn statistics(&self) -> Statistics;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_next_is_unique() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert_ne!(a, b);
        assert!(b.into_inner() > a.into_inner());
    }
}
