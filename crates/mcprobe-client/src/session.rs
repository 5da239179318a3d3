//! Session lifecycle.
//!
//! ```text
//! Unstarted ──handshake──► Initialized ──first successful call──► Active
//!     │                         │                                   │
//!     └─────────────── close / fatal error ─────────────────────────┴──► Closed
//! ```
//!
//! The states are tracked, not enforced: a call made while `Unstarted` is
//! still sent, and the server's answer is authoritative.

use serde::Serialize;
use std::fmt;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No successful handshake yet.
    #[default]
    Unstarted,
    /// Handshake succeeded, no other call has succeeded yet.
    Initialized,
    /// At least one tool or resource call has succeeded.
    Active,
    /// The server has been terminated.
    Closed,
}

impl SessionState {
    /// Whether the session has ended.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// State after a successful handshake.
    #[must_use]
    pub const fn after_handshake(self) -> Self {
        match self {
            Self::Unstarted => Self::Initialized,
            other => other,
        }
    }

    /// State after a successful call other than the handshake.
    #[must_use]
    pub const fn after_call(self) -> Self {
        match self {
            Self::Initialized => Self::Active,
            other => other,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unstarted => "unstarted",
            Self::Initialized => "initialized",
            Self::Active => "active",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        let state = SessionState::default();
        assert_eq!(state, SessionState::Unstarted);

        // Calls before the handshake do not advance the session.
        assert_eq!(state.after_call(), SessionState::Unstarted);

        let state = state.after_handshake();
        assert_eq!(state, SessionState::Initialized);

        let state = state.after_call();
        assert_eq!(state, SessionState::Active);
        assert_eq!(state.after_handshake(), SessionState::Active);
    }

    #[test]
    fn test_closed_is_terminal() {
        let closed = SessionState::Closed;
        assert!(closed.is_closed());
        assert_eq!(closed.after_handshake(), SessionState::Closed);
        assert_eq!(closed.after_call(), SessionState::Closed);
        assert_eq!(closed.to_string(), "closed");
    }
}
