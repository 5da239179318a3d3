//! Line-delimited stdio transport for the mcprobe harness.
//!
//! A transport moves single lines of bytes between the harness and an MCP
//! server. It knows nothing about JSON-RPC: framing, correlation and error
//! classification live in `mcprobe-client`.
//!
//! # Available Transports
//!
//! | Transport | Use Case |
//! |-----------|----------|
//! | [`ProcessTransport`] | Launch a server as a child process and talk over its stdio |
//! | [`MemoryTransport`] | In-process peer for unit tests |
//!
//! # Example
//!
//! ```no_run
//! use mcprobe_transport::{ProcessTransport, Transport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mcprobe_transport::TransportError> {
//!     let mut transport = ProcessTransport::builder("my-mcp-server").spawn().await?;
//!
//!     transport.write_line(br#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#).await?;
//!     let reply = transport.read_line().await;
//!
//!     // Always release the child, whatever happened above.
//!     transport.terminate().await?;
//!     reply?;
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]

pub mod error;
pub mod memory;
pub mod process;
pub mod stderr;
pub mod traits;

pub use error::TransportError;
pub use memory::{MemoryPeer, MemoryTransport};
pub use process::{DEFAULT_SHUTDOWN_GRACE, ProcessTransport, ProcessTransportBuilder};
pub use stderr::{DEFAULT_STDERR_CAPACITY, StderrCapture};
pub use traits::{Transport, TransportMetadata};

/// Maximum allowed line size (16 MB).
pub const MAX_LINE_SIZE: usize = 16 * 1024 * 1024;

/// First 100 characters of a line, for log output.
pub(crate) fn preview(line: &[u8]) -> String {
    String::from_utf8_lossy(line).chars().take(100).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_is_bounded() {
        let long = vec![b'x'; 500];
        assert_eq!(preview(&long).len(), 100);
        assert_eq!(preview(b"short"), "short");
    }
}
