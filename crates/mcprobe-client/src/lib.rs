//! Correlating JSON-RPC client for MCP servers under test.
//!
//! This crate sits on top of a [`mcprobe_transport::Transport`] and
//! provides:
//!
//! - [`Client::call`]: one request, one response line, matched by id and
//!   bounded by a timeout
//! - The `initialize` handshake and typed helpers for tools and resources
//! - An error taxonomy that separates recoverable server errors from
//!   failures that end the session
//!
//! # Example
//!
//! ```no_run
//! use mcprobe_client::{ClientBuilder, ClientError};
//! use mcprobe_transport::ProcessTransport;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ClientError> {
//!     let transport = ProcessTransport::builder("my-mcp-server")
//!         .spawn()
//!         .await
//!         .map_err(ClientError::Spawn)?;
//!     let mut client = ClientBuilder::new().connect(transport).await?;
//!
//!     match client.call_tool("hello", serde_json::json!({"name": "Alice"})).await {
//!         Ok(result) => println!("{:?}", result.first_text()),
//!         Err(ClientError::Remote { code, message, .. }) => println!("rejected: {code} {message}"),
//!         Err(fatal) => return Err(fatal),
//!     }
//!
//!     client.close().await
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod builder;
pub mod client;
pub mod error;
pub mod session;

pub use builder::ClientBuilder;
pub use client::{Client, ClientConfig, DEFAULT_TIMEOUT};
pub use error::ClientError;
pub use session::SessionState;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::builder::ClientBuilder;
    pub use crate::client::{Client, ClientConfig};
    pub use crate::error::ClientError;
    pub use crate::session::SessionState;
}
