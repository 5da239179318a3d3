//! Client builder for fluent construction.
//!
//! The [`ClientBuilder`] collects the handshake identity and timing options
//! and either wraps a transport in an unstarted [`Client`] or connects it
//! straight away.

use mcprobe_core::capability::ClientInfo;
use mcprobe_transport::Transport;
use std::time::Duration;
use tracing::warn;

use crate::client::{Client, ClientConfig};
use crate::error::ClientError;

/// Builder for constructing MCP clients.
///
/// # Example
///
/// ```no_run
/// use mcprobe_client::ClientBuilder;
/// use mcprobe_transport::ProcessTransport;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), mcprobe_client::ClientError> {
/// let transport = ProcessTransport::builder("my-server")
///     .spawn()
///     .await
///     .map_err(mcprobe_client::ClientError::Spawn)?;
/// let client = ClientBuilder::new()
///     .name("test-client")
///     .version("1.0.0")
///     .protocol_version("2024-11-05")
///     .timeout(Duration::from_secs(10))
///     .connect(transport)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    /// Create a new client builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the client name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.client_info.name = name.into();
        self
    }

    /// Set the client version.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.client_info.version = version.into();
        self
    }

    /// Set the client identity in one go.
    #[must_use]
    pub fn client_info(mut self, info: ClientInfo) -> Self {
        self.config.client_info = info;
        self
    }

    /// Set the protocol version requested in the handshake.
    #[must_use]
    pub fn protocol_version(mut self, version: impl Into<String>) -> Self {
        self.config.protocol_version = version.into();
        self
    }

    /// Set the bound on each request/response exchange.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Wrap `transport` in an unstarted client. No handshake is performed.
    pub fn build<T: Transport>(self, transport: T) -> Client<T> {
        Client::new(transport, self.config)
    }

    /// Build the client and perform the handshake.
    ///
    /// If the handshake fails the server is terminated before the error is
    /// returned.
    pub async fn connect<T: Transport>(self, transport: T) -> Result<Client<T>, ClientError> {
        let mut client = self.build(transport);
        match client.handshake().await {
            Ok(_) => Ok(client),
            Err(err) => {
                if let Err(close_err) = client.close().await {
                    warn!(error = %close_err, "Failed to close client after handshake failure");
                }
                Err(err)
            }
        }
    }
}
