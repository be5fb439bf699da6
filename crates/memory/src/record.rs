//! Conversation records — the append-only units of memory.
//!
//! A `TaskRecord` is the user's input for one turn; a `StepRecord` is one
//! completed agent turn. Both are immutable once constructed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vireo_core::message::ContentBlock;
use vireo_core::provider::Usage;
use vireo_core::tool::{ToolCall, ToolResult};

/// Content of a user task: plain text, or an ordered sequence of typed
/// parts (text / image).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskContent {
    Text(String),
    Parts(Vec<ContentBlock>),
}

impl TaskContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn parts(parts: Vec<ContentBlock>) -> Self {
        Self::Parts(parts)
    }
}

/// The user's input for one conversational turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Unique record ID
    pub id: String,

    /// What the user asked for
    pub content: TaskContent,

    /// When the task was received
    pub created_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn new(content: TaskContent) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content,
            created_at: Utc::now(),
        }
    }
}

/// One completed agent turn.
///
/// If tool calls are present, `tool_results` is either empty (the step was
/// recorded before dispatch, e.g. in a mid-run snapshot) or index-aligned
/// with `tool_calls`, matched by call id. `ConversationMemory::add_step`
/// enforces the alignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Zero-based step index within the conversation
    pub index: u32,

    /// Visible response text, if the model produced any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Reasoning text, if the model produced any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,

    /// Tool calls requested this turn, in stream order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Results of those calls, index-aligned with `tool_calls`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolResult>,

    /// Token counts for the provider round-trip behind this step
    #[serde(default)]
    pub usage: Usage,

    /// When the step completed
    pub created_at: DateTime<Utc>,
}

impl StepRecord {
    /// Create an empty step at the given index.
    pub fn new(index: u32) -> Self {
        Self {
            index,
            text: None,
            thinking: None,
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            usage: Usage::default(),
            created_at: Utc::now(),
        }
    }

    /// Set the response text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set the reasoning text.
    pub fn with_thinking(mut self, thinking: impl Into<String>) -> Self {
        self.thinking = Some(thinking.into());
        self
    }

    /// Set the tool calls and their results.
    pub fn with_tools(mut self, calls: Vec<ToolCall>, results: Vec<ToolResult>) -> Self {
        self.tool_calls = calls;
        self.tool_results = results;
        self
    }

    /// Set the token counts.
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }

    /// Whether this step requested any tool calls.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_content_untagged_serialization() {
        let text = TaskContent::text("hello");
        assert_eq!(serde_json::to_string(&text).unwrap(), r#""hello""#);

        let parts = TaskContent::parts(vec![ContentBlock::text("hi")]);
        let json = serde_json::to_string(&parts).unwrap();
        assert!(json.starts_with('['));

        let back: TaskContent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, parts);
    }

    #[test]
    fn step_record_builder() {
        let step = StepRecord::new(3)
            .with_text("done")
            .with_thinking("because")
            .with_usage(Usage {
                input_tokens: 10,
                output_tokens: 5,
            });
        assert_eq!(step.index, 3);
        assert_eq!(step.text.as_deref(), Some("done"));
        assert_eq!(step.thinking.as_deref(), Some("because"));
        assert!(!step.has_tool_calls());
        assert_eq!(step.usage.total(), 15);
    }

    #[test]
    fn step_record_serialization_skips_empty_fields() {
        let step = StepRecord::new(0);
        let json = serde_json::to_string(&step).unwrap();
        assert!(!json.contains("tool_calls"));
        assert!(!json.contains("thinking"));
    }
}
