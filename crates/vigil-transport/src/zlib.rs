//! Compression filter connection.
//!
//! [`ZlibFilter`] wraps another [`Connection`] and presents the same
//! contract, so whatever sits on top (the frame codec) does not change when
//! compression is switched on. On the wire the filter emits blocks:
//!
//! ```text
//! [ compressed length: u32 BE ][ zlib stream (length bytes) ]
//! ```
//!
//! The write side accumulates bytes until `buffer_size` is reached (0 means
//! every `send` produces a block), the read side reassembles whole blocks
//! from however the inner connection chunks them and yields the
//! decompressed bytes.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use tokio::sync::Mutex;

use crate::{Connection, ConnectionId, Statistics, TransportError};

/// Size of the block length prefix.
const BLOCK_PREFIX: usize = 4;

/// Largest compressed block the read side accepts.
///
/// A length prefix above this can only come from a damaged stream; waiting
/// for that many bytes would stall the connection forever.
pub const MAX_BLOCK_SIZE: usize = 64 * 1024 * 1024;

/// A zlib compression filter over another connection.
pub struct ZlibFilter<C> {
    inner: C,
    enabled: AtomicBool,
    level: Compression,
    buffer_size: usize,
    write_buffer: Mutex<Vec<u8>>,
    read_buffer: Mutex<Vec<u8>>,
}

impl<C: Connection> ZlibFilter<C> {
    /// Wraps `inner` with compression enabled from the first byte.
    ///
    /// `level` is the zlib level (0–9, clamped); `buffer_size` is how many
    /// bytes to accumulate before emitting a block.
    pub fn new(inner: C, level: u32, buffer_size: usize) -> Self {
        let filter = Self::passthrough(inner, level, buffer_size);
        filter.enabled.store(true, Ordering::Release);
        filter
    }

    /// Wraps `inner` in pass-through mode: bytes flow unchanged until
    /// [`enable`](Self::enable) is called.
    ///
    /// Streams start like this because the decision to compress is only
    /// taken once the peers have negotiated over the raw connection.
    pub fn passthrough(inner: C, level: u32, buffer_size: usize) -> Self {
        Self {
            inner,
            enabled: AtomicBool::new(false),
            level: Compression::new(level.min(9)),
            buffer_size,
            write_buffer: Mutex::new(Vec::new()),
            read_buffer: Mutex::new(Vec::new()),
        }
    }

    /// Switches compression on for both directions.
    ///
    /// `pending` holds bytes that were already received from the inner
    /// connection but not consumed by the layer above; they are the start
    /// of the compressed stream and are parsed before anything new is read.
    pub async fn enable(&self, pending: Vec<u8>) {
        if !pending.is_empty() {
            tracing::trace!(
                id = %self.inner.id(),
                bytes = pending.len(),
                "compression filter adopted pending bytes"
            );
        }
        let mut read_buffer = self.read_buffer.lock().await;
        let mut adopted = pending;
        adopted.extend_from_slice(&read_buffer);
        *read_buffer = adopted;
        self.enabled.store(true, Ordering::Release);
    }

    /// Returns `true` once compression is active.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Returns the wrapped connection.
    pub fn get_ref(&self) -> &C {
        &self.inner
    }

    async fn send_block(&self, data: &[u8]) -> Result<(), TransportError> {
        let compressed = compress(data, self.level)?;
        tracing::trace!(
            id = %self.inner.id(),
            raw = data.len(),
            compressed = compressed.len(),
            "compressed block"
        );
        let mut block = Vec::with_capacity(BLOCK_PREFIX + compressed.len());
        block.extend_from_slice(&(compressed.len() as u32).to_be_bytes());
        block.extend_from_slice(&compressed);
        self.inner.send(&block).await
    }
}

impl<C: Connection> Connection for ZlibFilter<C> {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if !self.is_enabled() {
            return self.inner.send(data).await;
        }
        let mut write_buffer = self.write_buffer.lock().await;
        write_buffer.extend_from_slice(data);
        if write_buffer.len() >= self.buffer_size && !write_buffer.is_empty()
        {
            let pending = std::mem::take(&mut *write_buffer);
            self.send_block(&pending).await?;
        }
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        if !self.is_enabled() {
            return self.inner.recv().await;
        }
        let mut read_buffer = self.read_buffer.lock().await;
        loop {
            if let Some(block) = take_block(&mut read_buffer)? {
                return decompress(&block).map(Some);
            }
            match self.inner.recv().await? {
                Some(bytes) => read_buffer.extend_from_slice(&bytes),
                None => {
                    if !read_buffer.is_empty() {
                        tracing::debug!(
                            id = %self.inner.id(),
                            bytes = read_buffer.len(),
                            "dropping incomplete compressed block at close"
                        );
                        read_buffer.clear();
                    }
                    return Ok(None);
                }
            }
        }
    }

    async fn flush(&self) -> Result<(), TransportError> {
        if self.is_enabled() {
            let mut write_buffer = self.write_buffer.lock().await;
            if !write_buffer.is_empty() {
                let pending = std::mem::take(&mut *write_buffer);
                self.send_block(&pending).await?;
            }
        }
        self.inner.flush().await
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.flush().await?;
        self.inner.close().await
    }

    fn id(&self) -> ConnectionId {
        self.inner.id()
    }

    fn statistics(&self) -> Statistics {
        self.inner.statistics()
    }
}

/// Splits one whole block off the front of `buffer`, if there is one.
fn take_block(buffer: &mut Vec<u8>) -> Result<Option<Vec<u8>>, TransportError> {
    if buffer.len() < BLOCK_PREFIX {
        return Ok(None);
    }
    let mut prefix = [0u8; BLOCK_PREFIX];
    prefix.copy_from_slice(&buffer[..BLOCK_PREFIX]);
    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_BLOCK_SIZE {
        return Err(TransportError::Compression(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("compressed block of {len} bytes exceeds {MAX_BLOCK_SIZE}"),
        )));
    }
    if buffer.len() < BLOCK_PREFIX + len {
        return Ok(None);
    }
    let block = buffer[BLOCK_PREFIX..BLOCK_PREFIX + len].to_vec();
    buffer.drain(..BLOCK_PREFIX + len);
    Ok(Some(block))
}

fn compress(data: &[u8], level: Compression) -> Result<Vec<u8>, TransportError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), level);
    encoder.write_all(data).map_err(TransportError::Compression)?;
    encoder.finish().map_err(TransportError::Compression)
}

fn decompress(block: &[u8]) -> Result<Vec<u8>, TransportError> {
    let mut out = Vec::new();
    ZlibDecoder::new(block)
        .read_to_end(&mut out)
        .map_err(TransportError::Compression)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_block_waits_for_prefix() {
        let mut buffer = vec![0, 0];
        assert!(take_block(&mut buffer).unwrap().is_none());
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_take_block_waits_for_body() {
        let mut buffer = vec![0, 0, 0, 5, 1, 2];
        assert!(take_block(&mut buffer).unwrap().is_none());
    }

    #[test]
    fn test_take_block_splits_exactly_one_block() {
        let mut buffer = vec![0, 0, 0, 2, 0xAA, 0xBB, 0, 0, 0];
        let block = take_block(&mut buffer).unwrap().unwrap();
        assert_eq!(block, vec![0xAA, 0xBB]);
        assert_eq!(buffer, vec![0, 0, 0]);
    }

    #[test]
    fn test_take_block_rejects_absurd_length() {
        let mut buffer = vec![0xFF, 0xFF, 0xFF, 0xFF];
        let err = take_block(&mut buffer).unwrap_err();
        assert!(matches!(err, TransportError::Compression(_)));
    }

    #[test]
    fn test_compress_then_decompress_restores_bytes() {
        let data = b"host_status host_status host_status".repeat(20);
        let compressed = compress(&data, Compression::default()).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn test_decompress_rejects_garbage() {
        assert!(decompress(&[1, 2, 3, 4, 5]).is_err());
    }
}
