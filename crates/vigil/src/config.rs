//! Broker endpoint configuration.
//!
//! A config file is JSON; every field is optional:
//!
//! ```json
//! {
//!   "endpoint": { "address": "0.0.0.0:5669", "role": "responder" },
//!   "stream": { "compression": true, "ack_limit": 500 },
//!   "log_filter": "vigil=debug"
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;
use vigil_stream::{Role, StreamConfig};

use crate::VigilError;

/// Where an endpoint listens or connects, and which side of the handshake
/// it plays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// `host:port` to bind (responder) or connect to (initiator).
    pub address: String,
    pub role: Role,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:5669".to_string(),
            role: Role::Responder,
        }
    }
}

/// Everything a broker endpoint needs to start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub endpoint: EndpointConfig,
    pub stream: StreamConfig,
    /// Default `tracing` filter, used when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            stream: StreamConfig::default(),
            log_filter: "info".to_string(),
        }
    }
}

impl BrokerConfig {
    /// Highest zlib compression level.
    pub const MAX_COMPRESSION_LEVEL: u32 = 9;

    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::Config`] if the document is not valid JSON or
    /// a field has the wrong type.
    pub fn from_json_str(json: &str) -> Result<Self, VigilError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| VigilError::Config(e.to_string()))?;
        Ok(config.validated())
    }

    /// Reads and parses a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`VigilError::Io`] if the file cannot be read, otherwise
    /// like [`from_json_str`](Self::from_json_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, VigilError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Clamps out-of-range values, logging each correction.
    pub fn validated(mut self) -> Self {
        if self.stream.compression_level > Self::MAX_COMPRESSION_LEVEL {
            warn!(
                level = self.stream.compression_level,
                max = Self::MAX_COMPRESSION_LEVEL,
                "compression_level exceeds maximum, clamping"
            );
            self.stream.compression_level = Self::MAX_COMPRESSION_LEVEL;
        }
        if self.stream.handshake_timeout.is_zero() {
            let default = StreamConfig::default().handshake_timeout;
            warn!(?default, "handshake_timeout is zero, using default");
            self.stream.handshake_timeout = default;
        }
        if self.stream.coarse && self.stream.compression {
            warn!("coarse streams skip negotiation, compression will never be used");
        }
        self
    }
}
