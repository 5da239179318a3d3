//! Handshake payloads: identities, capabilities, and protocol versions.
//!
//! The harness only performs the single `initialize` exchange, so client
//! capabilities are always empty and server capabilities are kept as
//! reported, without negotiation.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// The protocol version the harness requests by default.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Protocol versions the harness knows how to talk to.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

/// Check whether a protocol version is one the harness knows.
#[must_use]
pub fn is_version_supported(version: &str) -> bool {
    SUPPORTED_PROTOCOL_VERSIONS.contains(&version)
}

/// Client identity sent in the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    pub version: String,
}

impl ClientInfo {
    /// Create client info.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Server identity returned by the handshake.
///
/// A server that omits a field, or reports it with the wrong JSON type, has
/// still answered. Such fields decode as `None` so the anomaly can be
/// reported instead of failing the handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server name.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    /// Server version.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<String>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

fn lenient_server_info<'de, D>(deserializer: D) -> Result<Option<ServerInfo>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(ServerInfo::deserialize(value).ok())
}

/// Capabilities advertised by the client. Always empty for the harness.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientCapabilities {}

/// Tool capability flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCapability {
    /// If true, the server will send tool list changed notifications.
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Resource capability flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCapability {
    /// If true, the server supports resource subscriptions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<bool>,
    /// If true, the server will send resource list changed notifications.
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Capabilities advertised by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Tool capabilities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolCapability>,
    /// Resource capabilities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceCapability>,
    /// Anything else the server advertised (prompts, logging, experimental).
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

impl ServerCapabilities {
    /// Check if the server advertises tools.
    #[must_use]
    pub fn has_tools(&self) -> bool {
        self.tools.is_some()
    }

    /// Check if the server advertises resources.
    #[must_use]
    pub fn has_resources(&self) -> bool {
        self.resources.is_some()
    }
}

/// Parameters of the `initialize` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeRequest {
    /// Protocol version the client asks for.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Client capabilities.
    pub capabilities: ClientCapabilities,
    /// Client identity.
    #[serde(rename = "clientInfo")]
    pub client_info: ClientInfo,
}

impl InitializeRequest {
    /// Create an initialize request with empty capabilities.
    pub fn new(protocol_version: impl Into<String>, client_info: ClientInfo) -> Self {
        Self {
            protocol_version: protocol_version.into(),
            capabilities: ClientCapabilities::default(),
            client_info,
        }
    }
}

/// Result of the `initialize` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitializeResult {
    /// Protocol version the server agreed to.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Server capabilities.
    #[serde(default)]
    pub capabilities: ServerCapabilities,
    /// Server identity, if reported.
    #[serde(
        rename = "serverInfo",
        default,
        deserialize_with = "lenient_server_info",
        skip_serializing_if = "Option::is_none"
    )]
    pub server_info: Option<ServerInfo>,
    /// Optional instructions for using this server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl InitializeResult {
    /// The server name, if the server reported one.
    #[must_use]
    pub fn server_name(&self) -> Option<&str> {
        self.server_info.as_ref()?.name.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_initialize_request_wire_shape() {
        let request = InitializeRequest::new(PROTOCOL_VERSION, ClientInfo::new("test-client", "1.0.0"));
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "test-client", "version": "1.0.0"}
            })
        );
    }

    #[test]
    fn test_initialize_result_from_server() {
        let result: InitializeResult = serde_json::from_value(json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {
                "tools": {"listChanged": true},
                "resources": {"subscribe": false, "listChanged": true},
                "logging": {}
            },
            "serverInfo": {"name": "hello-world-server", "version": "1.0.0"}
        }))
        .unwrap();

        assert_eq!(result.server_name(), Some("hello-world-server"));
        assert!(result.capabilities.has_tools());
        assert!(result.capabilities.has_resources());
        assert!(result.capabilities.other.contains_key("logging"));
    }

    #[test]
    fn test_missing_server_info_is_tolerated() {
        let result: InitializeResult =
            serde_json::from_value(json!({"protocolVersion": "2024-11-05"})).unwrap();
        assert_eq!(result.server_name(), None);

        let nameless: InitializeResult = serde_json::from_value(json!({
            "protocolVersion": "2024-11-05",
            "serverInfo": {"version": "0.1"}
        }))
        .unwrap();
        assert_eq!(nameless.server_name(), None);
    }

    #[test]
    fn test_mistyped_server_info_is_tolerated() {
        let numeric: InitializeResult = serde_json::from_value(json!({
            "protocolVersion": "2024-11-05",
            "serverInfo": {"name": 42, "version": "1.0.0"}
        }))
        .unwrap();
        assert_eq!(numeric.server_name(), None);
        assert_eq!(
            numeric.server_info.unwrap().version.as_deref(),
            Some("1.0.0")
        );

        let scalar: InitializeResult = serde_json::from_value(json!({
            "protocolVersion": "2024-11-05",
            "serverInfo": "hello-world-server"
        }))
        .unwrap();
        assert_eq!(scalar.server_info, None);
    }

    #[test]
    fn test_version_support() {
        assert!(is_version_supported("2024-11-05"));
        assert!(!is_version_supported("1999-01-01"));
    }
}
