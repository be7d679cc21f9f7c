//! `BrokerServer` builder and accept loop, plus [`connect`].
//!
//! This is the entry point for running a broker endpoint over TCP. It ties
//! together all the layers: transport → stream → protocol → registry.
//! Every accepted connection gets its own task, which negotiates and then
//! hands the ready stream to the user's handler.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use vigil_events::Registry;
use vigil_stream::{FramedStream, Role, StreamConfig};
use vigil_transport::{TcpConnection, TcpTransport, Transport};

use crate::{BrokerConfig, VigilError};

/// Shared server state passed to each connection task.
struct ServerState<F> {
    registry: Arc<Registry>,
    config: StreamConfig,
    role: Role,
    handler: F,
}

/// Builder for configuring and starting a broker server.
///
/// # Example
///
/// ```rust,ignore
/// use vigil::prelude::*;
///
/// async fn handle(mut stream: FramedStream<TcpConnection>) -> Result<(), VigilError> {
///     loop {
///         match stream.read(None).await {
///             Ok(Some(event)) => tracing::info!(?event, "received"),
///             Ok(None) => {}
///             Err(StreamError::Closed) => return Ok(()),
///             Err(e) => return Err(e.into()),
///         }
///     }
/// }
///
/// let server = BrokerServer::builder()
///     .bind("0.0.0.0:5669")
///     .registry(registry)
///     .build(handle)
///     .await?;
/// server.run().await
/// ```
pub struct BrokerServerBuilder {
    bind_addr: String,
    role: Role,
    stream_config: StreamConfig,
    registry: Arc<Registry>,
}

impl BrokerServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:5669".to_string(),
            role: Role::Responder,
            stream_config: StreamConfig::default(),
            registry: Arc::new(Registry::new()),
        }
    }

    /// Takes address, role and stream settings from a loaded config.
    pub fn from_config(config: &BrokerConfig) -> Self {
        Self::new()
            .bind(&config.endpoint.address)
            .role(config.endpoint.role)
            .stream_config(config.stream.clone())
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the handshake role of accepted streams. Defaults to responder.
    pub fn role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Sets the configuration of every accepted stream.
    pub fn stream_config(mut self, config: StreamConfig) -> Self {
        self.stream_config = config;
        self
    }

    /// Sets the registry used to encode and decode events.
    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = registry;
        self
    }

    /// Binds the listener and returns the server, ready to run.
    ///
    /// `handler` is called once per connection with a negotiated stream.
    /// An error it returns is logged and ends that connection only.
    pub async fn build<F, Fut>(self, handler: F) -> Result<BrokerServer<F>, VigilError>
    where
        F: Fn(FramedStream<TcpConnection>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), VigilError>> + Send + 'static,
    {
        let transport = TcpTransport::bind(&self.bind_addr).await?;
        let state = Arc::new(ServerState {
            registry: self.registry,
            config: self.stream_config,
            role: self.role,
            handler,
        });
        Ok(BrokerServer { transport, state })
    }
}

impl Default for BrokerServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound broker server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct BrokerServer<F> {
    transport: TcpTransport,
    state: Arc<ServerState<F>>,
}

impl BrokerServer<()> {
    /// Creates a new builder.
    pub fn builder() -> BrokerServerBuilder {
        BrokerServerBuilder::new()
    }
}

impl<F, Fut> BrokerServer<F>
where
    F: Fn(FramedStream<TcpConnection>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), VigilError>> + Send + 'static,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop.
    ///
    /// Spawns one task per accepted connection. Runs until the process is
    /// terminated or the task running it is aborted.
    pub async fn run(mut self) -> Result<(), VigilError> {
        tracing::info!("broker server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

async fn handle_connection<F, Fut>(
    conn: TcpConnection,
    state: Arc<ServerState<F>>,
) -> Result<(), VigilError>
where
    F: Fn(FramedStream<TcpConnection>) -> Fut,
    Fut: Future<Output = Result<(), VigilError>>,
{
    let peer = conn.peer_addr();
    let mut stream = FramedStream::new(conn, Arc::clone(&state.registry), state.config.clone());
    let id = stream.id();
    tracing::info!(%id, %peer, "accepted connection");

    let extensions = stream.negotiate(state.role).await?;
    tracing::debug!(%id, ?extensions, "stream ready");

    let result = (state.handler)(stream).await;
    tracing::debug!(%id, "connection finished");
    result
}

/// Connects to a broker at `addr` and negotiates as the initiator.
///
/// # Errors
///
/// Fails if the connection cannot be opened or negotiation fails.
pub async fn connect(
    addr: &str,
    config: StreamConfig,
    registry: Arc<Registry>,
) -> Result<FramedStream<TcpConnection>, VigilError> {
    let conn = TcpConnection::connect(addr).await?;
    let mut stream = FramedStream::new(conn, registry, config);
    let extensions = stream.negotiate(Role::Initiator).await?;
    tracing::debug!(id = %stream.id(), addr, ?extensions, "connected");
    Ok(stream)
}
