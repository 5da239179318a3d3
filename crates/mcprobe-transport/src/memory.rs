//! In-memory transport for testing.
//!
//! [`MemoryTransport::pair`] returns the client side of the channel and a
//! [`MemoryPeer`] that plays the server: it receives request lines, sends
//! response lines (well-formed or not), and can write to a fake stderr.
//! Dropping the peer looks to the client exactly like a server exiting.
//!
//! # Example
//!
//! ```rust
//! use mcprobe_transport::{MemoryTransport, Transport};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (mut transport, mut peer) = MemoryTransport::pair();
//!
//! transport.write_line(b"ping").await.unwrap();
//! assert_eq!(peer.recv_line().await.unwrap(), b"ping");
//!
//! peer.send_line("pong");
//! assert_eq!(transport.read_line().await.unwrap(), b"pong");
//! # }
//! ```

use crate::error::TransportError;
use crate::stderr::{DEFAULT_STDERR_CAPACITY, StderrCapture};
use crate::traits::{Transport, TransportMetadata};
use crate::{MAX_LINE_SIZE, preview};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tracing::debug;

/// The client side of an in-memory line channel.
#[derive(Debug)]
pub struct MemoryTransport {
    outgoing: Option<mpsc::UnboundedSender<Vec<u8>>>,
    incoming: mpsc::UnboundedReceiver<Vec<u8>>,
    stderr: StderrCapture,
    closed: bool,
    metadata: TransportMetadata,
}

/// The server side of an in-memory line channel.
#[derive(Debug)]
pub struct MemoryPeer {
    requests: mpsc::UnboundedReceiver<Vec<u8>>,
    responses: mpsc::UnboundedSender<Vec<u8>>,
    stderr: DuplexStream,
}

impl MemoryTransport {
    /// Create a connected transport and peer.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn pair() -> (Self, MemoryPeer) {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let (stderr_writer, stderr_reader) = tokio::io::duplex(4096);

        let transport = Self {
            outgoing: Some(request_tx),
            incoming: response_rx,
            stderr: StderrCapture::spawn(stderr_reader, DEFAULT_STDERR_CAPACITY, "memory"),
            closed: false,
            metadata: TransportMetadata::new("memory")
                .remote_addr("memory-peer")
                .connected_now(),
        };
        let peer = MemoryPeer {
            requests: request_rx,
            responses: response_tx,
            stderr: stderr_writer,
        };

        (transport, peer)
    }
}

impl Transport for MemoryTransport {
    async fn write_line(&mut self, line: &[u8]) -> Result<(), TransportError> {
        if line.contains(&b'\n') {
            return Err(TransportError::EmbeddedNewline);
        }
        let Some(outgoing) = self.outgoing.as_ref() else {
            return Err(TransportError::closed("transport terminated"));
        };

        outgoing
            .send(line.to_vec())
            .map_err(|_| TransportError::closed("peer stopped reading"))?;
        debug!(len = line.len(), preview = %preview(line), "Wrote line to memory peer");
        Ok(())
    }

    async fn read_line(&mut self) -> Result<Vec<u8>, TransportError> {
        if self.closed {
            return Err(TransportError::closed("transport terminated"));
        }

        loop {
            let Some(line) = self.incoming.recv().await else {
                return Err(TransportError::closed("peer closed the stream"));
            };
            if line.len() > MAX_LINE_SIZE {
                return Err(TransportError::MessageTooLarge {
                    size: line.len(),
                    max: MAX_LINE_SIZE,
                });
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Ok(line);
        }
    }

    fn drain_stderr(&mut self) -> String {
        self.stderr.drain()
    }

    async fn terminate(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        // Dropping the sender is what the peer sees as end-of-input.
        self.outgoing = None;
        self.incoming.close();
        self.stderr.finish(Duration::from_millis(100)).await;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
            || self
                .outgoing
                .as_ref()
                .is_none_or(mpsc::UnboundedSender::is_closed)
    }

    fn metadata(&self) -> TransportMetadata {
        self.metadata.clone()
    }
}

impl MemoryPeer {
    /// Receive the next line the client wrote. `None` once the client is gone.
    pub async fn recv_line(&mut self) -> Option<Vec<u8>> {
        self.requests.recv().await
    }

    /// Receive the next line and parse it as JSON.
    pub async fn recv_json(&mut self) -> Option<serde_json::Value> {
        let line = self.recv_line().await?;
        serde_json::from_slice(&line).ok()
    }

    /// Send one raw line to the client. Returns false if the client is gone.
    pub fn send_line(&self, line: impl AsRef<[u8]>) -> bool {
        self.responses.send(line.as_ref().to_vec()).is_ok()
    }

    /// Serialize `value` and send it as one line.
    pub fn send_json(&self, value: &serde_json::Value) -> bool {
        self.send_line(value.to_string())
    }

    /// Write to the fake stderr stream.
    pub async fn write_stderr(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.stderr.write_all(bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_lines_flow_both_ways() {
        let (mut transport, mut peer) = MemoryTransport::pair();

        transport.write_line(br#"{"id":1}"#).await.unwrap();
        assert_eq!(
            peer.recv_json().await.unwrap(),
            serde_json::json!({"id": 1})
        );

        peer.send_line("");
        peer.send_json(&serde_json::json!({"id": 1}));
        assert_eq!(transport.read_line().await.unwrap(), br#"{"id":1}"#);
    }

    #[tokio::test]
    async fn test_dropped_peer_closes_stream() {
        let (mut transport, mut peer) = MemoryTransport::pair();
        peer.write_stderr(b"exiting\n").await.unwrap();
        drop(peer);

        assert!(transport.read_line().await.unwrap_err().is_closed());
        assert!(transport.is_closed());

        transport.terminate().await.unwrap();
        assert_eq!(transport.drain_stderr(), "exiting\n");
    }

    #[tokio::test]
    async fn test_terminate_is_idempotent() {
        let (mut transport, _peer) = MemoryTransport::pair();
        transport.terminate().await.unwrap();
        transport.terminate().await.unwrap();
        assert!(transport.is_closed());
        assert!(transport.write_line(b"x").await.unwrap_err().is_closed());
    }
}
