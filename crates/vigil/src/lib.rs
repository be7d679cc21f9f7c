//! # Vigil
//!
//! Framed event streams for monitoring brokers.
//!
//! Vigil moves typed monitoring events between broker endpoints over an
//! unreliable byte stream. Events are split into checksummed frames, the
//! reader resynchronizes after corruption, and the two ends negotiate
//! optional compression before the first event.
//!
//! The layers are separate crates, re-exported here:
//!
//! - [`transport`]: connections that move bytes (TCP, in-memory, zlib)
//! - [`events`]: the [`Event`](events::Event) trait and the registry
//! - [`protocol`]: frames, checksums and the event codec
//! - [`stream`]: negotiated streams with acknowledgements
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vigil::prelude::*;
//!
//! // Register your event types, then:
//! // let server = BrokerServer::builder()
//! //     .bind("0.0.0.0:5669")
//! //     .registry(registry)
//! //     .build(handle)
//! //     .await?;
//! // server.run().await
//! ```

pub mod config;
mod error;
pub mod logging;
mod server;

pub use config::{BrokerConfig, EndpointConfig};
pub use error::VigilError;
pub use server::{BrokerServer, BrokerServerBuilder, connect};

pub use vigil_events as events;
pub use vigil_protocol as protocol;
pub use vigil_stream as stream;
pub use vigil_transport as transport;

/// Everything needed to run or connect to a broker endpoint.
pub mod prelude {
    pub use crate::{BrokerConfig, BrokerServer, EndpointConfig, VigilError, connect};
    pub use vigil_events::{Event, EventType, Field, Registry};
    pub use vigil_protocol::{ChunkTermination, Extensions, Raw};
    pub use vigil_stream::{FramedStream, Role, StreamConfig, StreamError};
    pub use vigil_transport::{Connection, MemoryConnection, TcpConnection};
}
