//! JSON-RPC 2.0 protocol types and line framing.
//!
//! The harness speaks newline-delimited JSON-RPC: every request is a single
//! compact JSON document followed by `\n`, and every response is expected on
//! a line of its own.
//!
//! # Example
//!
//! ```rust
//! use mcprobe_core::protocol::{Request, RequestId, decode_response, encode_request};
//!
//! let request = Request::new("tools/list", 1i64);
//! let line = encode_request(&request).unwrap();
//! assert!(!line.contains(&b'\n'));
//!
//! let response = decode_response(br#"{"jsonrpc":"2.0","id":1,"result":{"tools":[]}}"#).unwrap();
//! assert_eq!(response.id, RequestId::Number(1));
//! ```

use crate::error::JsonRpcError;
use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;
use thiserror::Error;

/// The JSON-RPC version string. Always "2.0".
pub const JSONRPC_VERSION: &str = "2.0";

/// A JSON-RPC request ID.
///
/// The harness only ever sends positive integers, but a server may echo back
/// any integer, a string, or `null` (the id of an error reply to a request
/// the server could not read). All of them decode, so a mismatch can be
/// reported as such instead of as an unreadable line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Integer request ID.
    Number(i64),
    /// String request ID.
    String(String),
    /// Explicit `null` ID.
    Null,
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        Self::Number(id)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::String(id.to_string())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "\"{s}\""),
            Self::Null => f.write_str("null"),
        }
    }
}

/// A JSON-RPC 2.0 request message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// The JSON-RPC version. Always "2.0".
    pub jsonrpc: Cow<'static, str>,
    /// The request ID for correlation.
    pub id: RequestId,
    /// The method to invoke.
    pub method: Cow<'static, str>,
    /// The method parameters, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Request {
    /// Create a new request with no parameters.
    #[must_use]
    pub fn new(method: impl Into<Cow<'static, str>>, id: impl Into<RequestId>) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(JSONRPC_VERSION),
            id: id.into(),
            method: method.into(),
            params: None,
        }
    }

    /// Create a new request with parameters.
    #[must_use]
    pub fn with_params(
        method: impl Into<Cow<'static, str>>,
        id: impl Into<RequestId>,
        params: serde_json::Value,
    ) -> Self {
        Self {
            params: Some(params),
            ..Self::new(method, id)
        }
    }
}

/// A JSON-RPC 2.0 response message.
///
/// `result` is wrapped so that an explicit `"result": null` decodes as
/// `Some(Value::Null)` and stays distinguishable from a missing member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// The JSON-RPC version. Should be "2.0".
    pub jsonrpc: String,
    /// The request ID this response answers.
    pub id: RequestId,
    /// The result on success.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<serde_json::Value>,
    /// The error on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

impl Response {
    /// Create a successful response.
    #[must_use]
    pub fn success(id: impl Into<RequestId>, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    #[must_use]
    pub fn error(id: impl Into<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            result: None,
            error: Some(error),
        }
    }

    /// Split the response into its outcome.
    ///
    /// Assumes the response passed [`decode_response`]; a response carrying
    /// neither member is reported as an internal error.
    pub fn into_result(self) -> Result<serde_json::Value, JsonRpcError> {
        match (self.result, self.error) {
            (_, Some(error)) => Err(error),
            (Some(result), None) => Ok(result),
            (None, None) => Err(JsonRpcError::internal_error(
                "Response contained neither result nor error",
            )),
        }
    }
}

/// Why a response line could not be accepted.
#[derive(Error, Debug)]
pub enum FrameError {
    /// The line is not a single JSON document of the expected shape.
    #[error("invalid JSON-RPC response: {0}")]
    Json(#[from] serde_json::Error),

    /// The `jsonrpc` member is not "2.0".
    #[error("unsupported jsonrpc version {found:?}")]
    Version {
        /// The version tag that was received.
        found: String,
    },

    /// Both or neither of `result` and `error` were present.
    #[error("response must carry exactly one of result or error, found {found}")]
    Shape {
        /// Description of what was found.
        found: &'static str,
    },

    /// The request would not fit on a single line.
    #[error("serialized request contains a raw newline")]
    EmbeddedNewline,
}

/// Serialize a request as one compact JSON document without a terminator.
pub fn encode_request(request: &Request) -> Result<Vec<u8>, FrameError> {
    let bytes = serde_json::to_vec(request)?;
    if bytes.contains(&b'\n') {
        return Err(FrameError::EmbeddedNewline);
    }
    Ok(bytes)
}

/// Parse one line as exactly one JSON-RPC response.
///
/// Trailing data after the document (for example a second document on the
/// same line) is rejected.
pub fn decode_response(line: &[u8]) -> Result<Response, FrameError> {
    let response: Response = serde_json::from_slice(line)?;

    if response.jsonrpc != JSONRPC_VERSION {
        return Err(FrameError::Version {
            found: response.jsonrpc,
        });
    }

    match (&response.result, &response.error) {
        (Some(_), Some(_)) => Err(FrameError::Shape {
            found: "both result and error",
        }),
        (None, None) => Err(FrameError::Shape {
            found: "neither result nor error",
        }),
        _ => Ok(response),
    }
}
