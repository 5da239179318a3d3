//! Client error taxonomy.
//!
//! Only [`ClientError::Remote`], [`ClientError::InvalidResult`], and
//! [`ClientError::Serialize`] leave the session usable. Everything else is
//! fatal: by the time the caller sees it, the client has already terminated
//! the server and attached whatever the server wrote to stderr.

use mcprobe_core::protocol::{FrameError, RequestId};
use mcprobe_transport::TransportError;
use miette::Diagnostic;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by [`Client`](crate::Client) operations.
#[derive(Error, Diagnostic, Debug)]
pub enum ClientError {
    // ========================================================================
    // Fatal: the session is closed when these are returned
    // ========================================================================
    /// The server process could not be started.
    #[error("Failed to start server: {0}")]
    #[diagnostic(
        code(mcprobe::spawn),
        help("Check that the server command exists and is executable")
    )]
    Spawn(#[source] TransportError),

    /// The server exited or closed its pipes.
    #[error("Server died during '{method}': {reason}")]
    #[diagnostic(code(mcprobe::server_died))]
    ServerDied {
        /// The method that was in flight.
        method: String,
        /// What the transport observed.
        reason: String,
        /// Captured server stderr.
        stderr: String,
    },

    /// No response line arrived in time.
    #[error("'{method}' (id {id}) got no response within {timeout:?}")]
    #[diagnostic(
        code(mcprobe::timeout),
        help("Raise the timeout if the server is slow to start, or check that it flushes stdout")
    )]
    Timeout {
        /// The method that was in flight.
        method: String,
        /// The id of the abandoned request.
        id: RequestId,
        /// The bound that expired.
        timeout: Duration,
        /// Captured server stderr.
        stderr: String,
    },

    /// The response id did not match the request id.
    #[error("Response id {actual} does not match request id {expected} (out-of-order or foreign response)")]
    #[diagnostic(code(mcprobe::protocol))]
    Protocol {
        /// The id that was sent.
        expected: RequestId,
        /// The id that came back.
        actual: RequestId,
        /// Captured server stderr.
        stderr: String,
    },

    /// The response line was not a single well-formed JSON-RPC response.
    #[error("Malformed response to '{method}': {reason}")]
    #[diagnostic(
        code(mcprobe::malformed_response),
        help("Servers must write exactly one JSON-RPC document per line on stdout; logs belong on stderr")
    )]
    MalformedResponse {
        /// The method that was in flight.
        method: String,
        /// The raw line as received.
        raw: String,
        /// Why it was rejected.
        reason: String,
        /// Captured server stderr.
        stderr: String,
    },

    /// The initialize exchange completed but its outcome is unacceptable.
    #[error("Handshake failed: {message}")]
    #[diagnostic(code(mcprobe::handshake))]
    Handshake {
        /// What was wrong with the handshake.
        message: String,
        /// Captured server stderr.
        stderr: String,
    },

    /// Any other transport failure.
    #[error("Transport error: {0}")]
    #[diagnostic(code(mcprobe::transport))]
    Transport(#[source] TransportError),

    /// The session was already closed.
    #[error("Session is closed")]
    #[diagnostic(
        code(mcprobe::session_closed),
        help("A fatal error or an explicit close ended this session")
    )]
    SessionClosed,

    // ========================================================================
    // Recoverable: the session stays open
    // ========================================================================
    /// The server answered with a JSON-RPC error object.
    #[error("Server returned error {code}: {message}")]
    #[diagnostic(code(mcprobe::remote), severity(warning))]
    Remote {
        /// JSON-RPC error code.
        code: i64,
        /// Error message.
        message: String,
        /// Additional error data.
        data: Option<serde_json::Value>,
    },

    /// The result did not have the shape the typed helper expected.
    #[error("Unexpected result for '{method}': {reason}")]
    #[diagnostic(code(mcprobe::invalid_result))]
    InvalidResult {
        /// The method whose result was rejected.
        method: String,
        /// Why it could not be decoded.
        reason: String,
    },

    /// The request could not be serialized.
    #[error("Failed to serialize request: {0}")]
    #[diagnostic(code(mcprobe::serialize))]
    Serialize(#[source] FrameError),
}

impl ClientError {
    /// Classify a transport failure that happened while `method` was in flight.
    pub fn from_transport(method: &str, err: TransportError) -> Self {
        if err.is_closed() {
            return Self::ServerDied {
                method: method.to_string(),
                reason: err.to_string(),
                stderr: String::new(),
            };
        }
        match err {
            TransportError::Spawn { .. } => Self::Spawn(err),
            other => Self::Transport(other),
        }
    }

    /// Whether this error ends the session.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::Remote { .. } | Self::InvalidResult { .. } | Self::Serialize(_)
        )
    }

    /// Short name of the error category, for reports.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Spawn(_) => "SpawnError",
            Self::ServerDied { .. } => "ServerDied",
            Self::Timeout { .. } => "Timeout",
            Self::Protocol { .. } => "ProtocolError",
            Self::MalformedResponse { .. } => "MalformedResponse",
            Self::Handshake { .. } => "HandshakeError",
            Self::Transport(_) => "TransportError",
            Self::Remote { .. } => "RemoteError",
            Self::InvalidResult { .. } => "InvalidResult",
            Self::Serialize(_) => "SerializeError",
            Self::SessionClosed => "SessionClosed",
        }
    }

    /// Captured server stderr, if any was attached and it is not empty.
    #[must_use]
    pub fn stderr(&self) -> Option<&str> {
        let stderr = match self {
            Self::ServerDied { stderr, .. }
            | Self::Timeout { stderr, .. }
            | Self::Protocol { stderr, .. }
            | Self::MalformedResponse { stderr, .. }
            | Self::Handshake { stderr, .. } => stderr,
            _ => return None,
        };
        (!stderr.trim().is_empty()).then_some(stderr.as_str())
    }

    /// Attach captured server stderr to the error, where it has a slot for it.
    #[must_use]
    pub fn with_stderr(mut self, captured: String) -> Self {
        match &mut self {
            Self::ServerDied { stderr, .. }
            | Self::Timeout { stderr, .. }
            | Self::Protocol { stderr, .. }
            | Self::MalformedResponse { stderr, .. }
            | Self::Handshake { stderr, .. } => *stderr = captured,
            _ => {}
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_only_remote_class_errors_are_recoverable() {
        let remote = ClientError::Remote {
            code: -32602,
            message: "bad args".into(),
            data: None,
        };
        assert!(!remote.is_fatal());
        assert_eq!(remote.kind(), "RemoteError");

        let died = ClientError::from_transport("tools/list", TransportError::closed("eof"));
        assert!(died.is_fatal());
        assert_eq!(died.kind(), "ServerDied");

        assert!(ClientError::SessionClosed.is_fatal());
    }

    #[test]
    fn test_transport_classification() {
        let spawn = ClientError::from_transport(
            "initialize",
            TransportError::Spawn {
                program: "x".into(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            },
        );
        assert_eq!(spawn.kind(), "SpawnError");

        let too_large = ClientError::from_transport(
            "tools/list",
            TransportError::MessageTooLarge { size: 2, max: 1 },
        );
        assert_eq!(too_large.kind(), "TransportError");
    }

    #[test]
    fn test_stderr_attachment() {
        let err = ClientError::from_transport("initialize", TransportError::closed("eof"));
        assert_eq!(err.stderr(), None);

        let err = err.with_stderr("Exception in thread main\n".into());
        assert_eq!(err.stderr(), Some("Exception in thread main\n"));

        let remote = ClientError::Remote {
            code: 1,
            message: "x".into(),
            data: None,
        }
        .with_stderr("ignored".into());
        assert_eq!(remote.stderr(), None);
    }

    #[test]
    fn test_protocol_message_names_both_ids() {
        let err = ClientError::Protocol {
            expected: RequestId::Number(3),
            actual: RequestId::Number(2),
            stderr: String::new(),
        };
        let message = err.to_string();
        assert!(message.contains("id 2"));
        assert!(message.contains("request id 3"));
    }
}
