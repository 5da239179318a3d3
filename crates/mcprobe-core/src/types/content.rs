//! Content items returned by tool calls.

use crate::types::resource::ResourceContents;
use serde::{Deserialize, Serialize};

/// A single content item in a tool result.
///
/// Content types the harness does not model decode as [`Content::Unknown`]
/// instead of failing the whole result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
    /// Base64-encoded image data.
    Image {
        /// The encoded image.
        data: String,
        /// MIME type of the image.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// An embedded resource.
    Resource {
        /// The embedded resource contents.
        resource: ResourceContents,
    },
    /// Any other content type.
    #[serde(other)]
    Unknown,
}

impl Content {
    /// Create a text content item.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// The text of this item, if it is a text item.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_text_content() {
        let content: Content = serde_json::from_value(json!({"type": "text", "text": "hi"})).unwrap();
        assert_eq!(content.as_text(), Some("hi"));
        assert_eq!(
            serde_json::to_value(Content::text("hi")).unwrap(),
            json!({"type": "text", "text": "hi"})
        );
    }

    #[test]
    fn test_unknown_content_type() {
        let content: Content =
            serde_json::from_value(json!({"type": "audio", "data": "AAAA", "mimeType": "audio/wav"}))
                .unwrap();
        assert_eq!(content, Content::Unknown);
        assert_eq!(content.as_text(), None);
    }
}
