//! The line-oriented transport abstraction.
//!
//! A [`Transport`] moves single lines of bytes to and from an MCP server.
//! Every method takes `&mut self`: a transport has exactly one user at a
//! time, and a caller cannot start a second exchange while one is pending.
//!
//! # Example
//!
//! ```ignore
//! use mcprobe_transport::Transport;
//!
//! async fn ping<T: Transport>(transport: &mut T) -> Result<Vec<u8>, mcprobe_transport::TransportError> {
//!     transport.write_line(br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#).await?;
//!     transport.read_line().await
//! }
//! ```

use crate::error::TransportError;
use std::future::Future;
use std::time::Instant;

/// Metadata about a transport connection.
#[derive(Debug, Clone, Default)]
pub struct TransportMetadata {
    /// Transport type identifier (e.g., "process-stdio", "memory").
    pub transport_type: String,
    /// Description of the remote end, such as the launched command line.
    pub remote_addr: Option<String>,
    /// Process ID of the remote end, if it is a process.
    pub pid: Option<u32>,
    /// When the connection was established.
    pub connected_at: Option<Instant>,
}

impl TransportMetadata {
    /// Create new metadata for a transport type.
    #[must_use]
    pub fn new(transport_type: impl Into<String>) -> Self {
        Self {
            transport_type: transport_type.into(),
            ..Self::default()
        }
    }

    /// Set the remote address.
    #[must_use]
    pub fn remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    /// Set the process ID.
    #[must_use]
    pub fn pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    /// Mark the connection time.
    #[must_use]
    pub fn connected_now(mut self) -> Self {
        self.connected_at = Some(Instant::now());
        self
    }
}

/// A line-delimited byte channel to an MCP server.
pub trait Transport: Send {
    /// Write one line and flush it.
    ///
    /// The bytes must not contain `\n`; the terminator is appended here.
    fn write_line(&mut self, line: &[u8])
    -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Read the next line, without its terminator.
    ///
    /// Fails with [`TransportError::Closed`] once the server's output has
    /// reached end-of-input.
    fn read_line(&mut self) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;

    /// Take whatever diagnostic output the server has produced so far.
    ///
    /// Never blocks. Only meant for error reports.
    fn drain_stderr(&mut self) -> String;

    /// Shut the server down and release it.
    ///
    /// Idempotent: calling this on an already terminated transport is a
    /// no-op that returns `Ok(())`.
    fn terminate(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Whether the transport can no longer carry messages.
    fn is_closed(&self) -> bool;

    /// Get metadata about this transport.
    fn metadata(&self) -> TransportMetadata;
}
