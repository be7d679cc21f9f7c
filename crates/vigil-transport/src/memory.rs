//! In-process connection pair backed by tokio channels.

use tokio::sync::{Mutex, mpsc};

use crate::{Connection, ConnectionId, Counters, Statistics, TransportError};

/// One end of an in-process duplex byte channel.
///
/// Create both ends at once with [`MemoryConnection::pair`]. Bytes sent on
/// one end come out of [`recv`](Connection::recv) on the other in the same
/// order. Closing (or dropping) one end makes the other end's `recv`
/// return `None` once everything already sent has been drained, which is
/// exactly how a socket's peer-closed condition looks to the codec.
pub struct MemoryConnection {
    id: ConnectionId,
    tx: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    counters: Counters,
}

impl MemoryConnection {
    /// Creates two connected ends.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (Self::new(a_tx, a_rx), Self::new(b_tx, b_rx))
    }

    fn new(
        tx: mpsc::UnboundedSender<Vec<u8>>,
        rx: mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> Self {
        Self {
            id: ConnectionId::next(),
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(rx),
            counters: Counters::new(),
        }
    }
}

impl Connection for MemoryConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if data.is_empty() {
            return Ok(());
        }
        let tx = self.tx.lock().await;
        let tx = tx.as_ref().ok_or(TransportError::Shutdown)?;
        tx.send(data.to_vec()).map_err(|_| {
            TransportError::ConnectionClosed("peer dropped".into())
        })?;
        self.counters.record_sent(data.len());
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let chunk = self.rx.lock().await.recv().await;
        if let Some(bytes) = &chunk {
            self.counters.record_received(bytes.len());
        }
        Ok(chunk)
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.tx.lock().await.take().is_some() {
            tracing::debug!(id = %self.id, "memory connection closed");
        }
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn statistics(&self) -> Statistics {
        self.counters.snapshot()
    }
}
