//! Transport error types.

use thiserror::Error;

/// Errors that can occur during transport operations.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The server process could not be started.
    #[error("Failed to spawn process '{program}': {source}")]
    Spawn {
        /// The program that was launched.
        program: String,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The channel to the server is gone: stdout reached end-of-input, stdin
    /// was closed, or the transport was terminated.
    #[error("Transport closed: {reason}")]
    Closed {
        /// What closed the channel.
        reason: String,
    },

    /// I/O error from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An outgoing line contained a raw newline and would break framing.
    #[error("Outgoing message contains a raw newline")]
    EmbeddedNewline,

    /// Message was too large.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Actual message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },
}

impl TransportError {
    /// Create a closed error.
    pub fn closed(reason: impl Into<String>) -> Self {
        Self::Closed {
            reason: reason.into(),
        }
    }

    /// Whether this error means the server can no longer be reached.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        match self {
            Self::Closed { .. } => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_classification() {
        assert!(TransportError::closed("eof").is_closed());
        assert!(
            TransportError::Io(std::io::Error::from(std::io::ErrorKind::BrokenPipe)).is_closed()
        );
        assert!(!TransportError::EmbeddedNewline.is_closed());
        assert!(
            !TransportError::Io(std::io::Error::from(std::io::ErrorKind::PermissionDenied))
                .is_closed()
        );
    }

    #[test]
    fn test_spawn_message_names_program() {
        let err = TransportError::Spawn {
            program: "no-such-server".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().contains("no-such-server"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
