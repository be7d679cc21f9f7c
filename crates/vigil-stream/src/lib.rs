//! Negotiated event streams for vigil.
//!
//! A [`FramedStream`] is what a broker endpoint actually talks to: it
//! writes and reads typed events over a [`Connection`](vigil_transport::Connection),
//! and takes care of everything the frame codec alone does not:
//!
//! 1. **Negotiation**: exchanging version records and agreeing on the
//!    extension set ([`Role`], [`StreamConfig`])
//! 2. **Extensions**: switching compression on, or dropping to coarse
//!    raw-byte mode
//! 3. **Acknowledgements**: telling the peer how many events were
//!    processed, and counting what the peer acknowledged
//!
//! # How it fits in the stack
//!
//! ```text
//! Broker endpoints (above)  ← read and write events
//!     ↕
//! Stream Layer (this crate)  ← negotiation, extensions, acks
//!     ↕
//! Protocol Layer (below)  ← frames, checksums, resync
//!     ↕
//! Transport Layer  ← bytes
//! ```

mod config;
mod error;
mod stream;

pub use config::{Role, StreamConfig};
pub use error::StreamError;
pub use stream::FramedStream;
