//! Tool listing and invocation payloads.

use crate::types::content::Content;
use serde::{Deserialize, Serialize};

/// A tool advertised by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Tool name, used in `tools/call`.
    pub name: String,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool arguments.
    #[serde(rename = "inputSchema", default)]
    pub input_schema: serde_json::Value,
}

impl Tool {
    /// Create a tool with an empty object schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: serde_json::json!({"type": "object"}),
        }
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the input schema.
    pub fn input_schema(mut self, schema: serde_json::Value) -> Self {
        self.input_schema = schema;
        self
    }
}

/// Result of `tools/list`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListToolsResult {
    /// The advertised tools.
    pub tools: Vec<Tool>,
    /// Pagination cursor.
    #[serde(rename = "nextCursor", default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Parameters of `tools/call`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolRequest {
    /// Name of the tool to call.
    pub name: String,
    /// Tool arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<serde_json::Value>,
}

/// Result of `tools/call`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallToolResult {
    /// Content items produced by the tool.
    #[serde(default)]
    pub content: Vec<Content>,
    /// Whether the tool reported a failure in-band.
    #[serde(rename = "isError", default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl CallToolResult {
    /// A successful text result.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(text)],
            is_error: None,
        }
    }

    /// A failed text result.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(text)],
            is_error: Some(true),
        }
    }

    /// Whether the tool flagged the result as an error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }

    /// Text of the first content item, if it is text.
    #[must_use]
    pub fn first_text(&self) -> Option<&str> {
        self.content.first().and_then(Content::as_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_list_tools_result() {
        let result: ListToolsResult = serde_json::from_value(json!({
            "tools": [
                {"name": "hello", "description": "Greets", "inputSchema": {"type": "object"}},
                {"name": "echo"}
            ]
        }))
        .unwrap();

        assert_eq!(result.tools.len(), 2);
        assert_eq!(result.tools[0].description.as_deref(), Some("Greets"));
        assert_eq!(result.tools[1].input_schema, serde_json::Value::Null);
    }

    #[test]
    fn test_call_tool_request_shape() {
        let request = CallToolRequest {
            name: "hello".into(),
            arguments: Some(json!({})),
        };
        assert_eq!(
            serde_json::to_value(request).unwrap(),
            json!({"name": "hello", "arguments": {}})
        );
    }

    #[test]
    fn test_call_tool_result() {
        let result: CallToolResult = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "Hello, World!"}],
            "isError": false
        }))
        .unwrap();
        assert_eq!(result.first_text(), Some("Hello, World!"));
        assert!(!result.is_error());
        assert!(CallToolResult::error("bad").is_error());
    }
}
