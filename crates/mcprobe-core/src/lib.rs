//! # mcprobe-core
//!
//! Wire types for the mcprobe MCP test harness.
//!
//! - **Protocol types**: JSON-RPC 2.0 request and response, plus the
//!   one-document-per-line framing used over stdio
//! - **Handshake types**: client/server identity, capabilities, and the
//!   protocol versions the harness understands
//! - **MCP payloads**: tools, resources, and content items
//!
//! This crate does no I/O and does not depend on an async runtime.
//!
//! # Example
//!
//! ```rust
//! use mcprobe_core::{
//!     capability::{ClientInfo, InitializeRequest, PROTOCOL_VERSION},
//!     protocol::{Request, encode_request},
//! };
//!
//! let params = InitializeRequest::new(PROTOCOL_VERSION, ClientInfo::new("test-client", "1.0.0"));
//! let request = Request::with_params("initialize", 1i64, serde_json::to_value(params).unwrap());
//! let line = encode_request(&request).unwrap();
//! assert!(line.starts_with(br#"{"jsonrpc":"2.0","id":1,"method":"initialize""#));
//! ```

#![deny(missing_docs)]
#![warn(clippy::unwrap_used)]
#![allow(clippy::module_name_repetitions)]

pub mod capability;
pub mod error;
pub mod protocol;
pub mod types;

pub use capability::{
    ClientCapabilities, ClientInfo, InitializeRequest, InitializeResult, PROTOCOL_VERSION,
    SUPPORTED_PROTOCOL_VERSIONS, ServerCapabilities, ServerInfo, is_version_supported,
};
pub use error::JsonRpcError;
pub use protocol::{
    FrameError, JSONRPC_VERSION, Request, RequestId, Response, decode_response, encode_request,
};
