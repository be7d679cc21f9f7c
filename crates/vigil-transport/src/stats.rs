//! Per-connection traffic counters.
//!
//! Every connection owns a [`Counters`] and hands out [`Statistics`]
//! snapshots on demand. Filters that wrap another connection (like the
//! zlib filter) report the statistics of the connection they wrap, so the
//! numbers always describe what actually crossed the wire.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// A point-in-time snapshot of a connection's traffic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Statistics {
    /// Total bytes handed to the peer.
    pub bytes_sent: u64,
    /// Total bytes received from the peer.
    pub bytes_received: u64,
    /// Number of successful `send` calls.
    pub sends: u64,
    /// Number of `recv` calls that returned data.
    pub receives: u64,
    /// Time since the connection was created.
    pub uptime: Duration,
}

impl Statistics {
    /// Average bytes per second in both directions since creation.
    ///
    /// Returns `0.0` for a connection younger than a millisecond, where
    /// the estimate would be meaningless.
    pub fn throughput(&self) -> f64 {
        let secs = self.uptime.as_secs_f64();
        if secs < 0.001 {
            return 0.0;
        }
        (self.bytes_sent + self.bytes_received) as f64 / secs
    }
}

/// Lock-free traffic counters shared by a connection's send and receive
/// paths.
#[derive(Debug)]
pub struct Counters {
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    sends: AtomicU64,
    receives: AtomicU64,
    started: Instant,
}

impl Counters {
    /// Creates zeroed counters starting the uptime clock now.
    pub fn new() -> Self {
        Self {
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            sends: AtomicU64::new(0),
            receives: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Records one successful send of `bytes` bytes.
    pub fn record_sent(&self, bytes: usize) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
        self.sends.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one receive that produced `bytes` bytes.
    pub fn record_received(&self, bytes: usize) {
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
        self.receives.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a snapshot of the current values.
    pub fn snapshot(&self) -> Statistics {
        Statistics {
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            sends: self.sends.load(Ordering::Relaxed),
            receives: self.receives.load(Ordering::Relaxed),
            uptime: self.started.elapsed(),
        }
    }
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}
