//! Wire-level message types sent to the LLM provider.
//!
//! These are not stored anywhere: conversation memory rebuilds the full
//! message list from its records on every turn, and these types are the
//! shape that rebuild produces.

use base64::Engine;
use serde::{Deserialize, Serialize};

/// The role of a message sender.
///
/// Tool results travel inside user messages as content blocks, and the
/// system prompt is a top-level request field, so only two roles exist
/// at this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user (or tool results echoed back to the model)
    User,
    /// The model
    Assistant,
}

/// One typed content block inside a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Model reasoning text, kept separate from the visible response.
    Thinking { thinking: String },

    /// Plain text.
    Text { text: String },

    /// An inline image, base64-encoded.
    Image { media_type: String, data: String },

    /// A tool invocation requested by the model.
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// The outcome of a tool invocation, answering a `ToolUse` by id.
    ToolResult {
        call_id: String,
        content: String,
        is_error: bool,
    },
}

impl ContentBlock {
    /// Create a text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create a thinking block.
    pub fn thinking(thinking: impl Into<String>) -> Self {
        Self::Thinking {
            thinking: thinking.into(),
        }
    }

    /// Create an image block from raw bytes, encoding them as base64.
    pub fn image_from_bytes(media_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::Image {
            media_type: media_type.into(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

/// A single message in the rebuilt provider request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub blocks: Vec<ContentBlock>,
}

impl Message {
    /// Create a user message from content blocks.
    pub fn user(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            blocks,
        }
    }

    /// Create an assistant message from content blocks.
    pub fn assistant(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            blocks,
        }
    }

    /// Create a user message holding a single text block.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::user(vec![ContentBlock::text(text)])
    }

    /// Create an assistant message holding a single text block.
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::assistant(vec![ContentBlock::text(text)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_message_constructors() {
        let msg = Message::user_text("Hello, agent!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.blocks, vec![ContentBlock::text("Hello, agent!")]);
    }

    #[test]
    fn image_block_encodes_base64() {
        let block = ContentBlock::image_from_bytes("image/png", b"\x89PNG");
        match &block {
            ContentBlock::Image { media_type, data } => {
                assert_eq!(media_type, "image/png");
                assert_eq!(data, "iVBORw==");
            }
            other => panic!("Expected image block, got: {other:?}"),
        }
    }

    #[test]
    fn content_block_serialization_is_tagged() {
        let block = ContentBlock::ToolUse {
            id: "call_1".into(),
            name: "web_search".into(),
            input: serde_json::json!({"query": "rust"}),
        };
        let json = serde_json::to_string(&block).unwrap();
        assert!(json.contains(r#""type":"tool_use""#));
        assert!(json.contains(r#""name":"web_search""#));
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = Message::assistant(vec![
            ContentBlock::thinking("considering"),
            ContentBlock::text("answer"),
            ContentBlock::ToolResult {
                call_id: "call_1".into(),
                content: "ok".into(),
                is_error: false,
            },
        ]);
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
