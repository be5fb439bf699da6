//! # Vireo Memory
//!
//! The step-structured conversation memory: an append-only log of task and
//! step records that rebuilds the flat provider message list on demand and
//! round-trips losslessly through JSON.
//!
//! The memory object is the sole source of truth for what the provider
//! sees. The message list is recomputed from the records on every call;
//! there is no incremental cache to fall out of sync.

pub mod record;

pub use record::{StepRecord, TaskContent, TaskRecord};

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vireo_core::error::MemoryError;
use vireo_core::message::{ContentBlock, Message};

/// One entry in the conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum Record {
    Task(TaskRecord),
    Step(StepRecord),
}

/// The append-only conversation log for one logical conversation.
///
/// Only the agent loop appends; concurrent tool execution never touches
/// memory directly. A step is appended once, fully resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMemory {
    id: String,
    records: Vec<Record>,
}

impl ConversationMemory {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            records: Vec::new(),
        }
    }

    /// The conversation ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// All records, in append order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The index the next appended step will carry.
    pub fn next_step_index(&self) -> u32 {
        self.records
            .iter()
            .filter(|r| matches!(r, Record::Step(_)))
            .count() as u32
    }

    /// Append a user task.
    pub fn add_task(&mut self, content: TaskContent) {
        self.records.push(Record::Task(TaskRecord::new(content)));
    }

    /// Append a completed step.
    ///
    /// Rejects a step whose tool results are present but not index-aligned
    /// with its tool calls, or whose call ids are not unique.
    pub fn add_step(&mut self, step: StepRecord) -> Result<(), MemoryError> {
        Self::check_alignment(&step)?;
        self.records.push(Record::Step(step));
        Ok(())
    }

    fn check_alignment(step: &StepRecord) -> Result<(), MemoryError> {
        for (i, call) in step.tool_calls.iter().enumerate() {
            if step.tool_calls[..i].iter().any(|c| c.id == call.id) {
                return Err(MemoryError::MisalignedResults {
                    reason: format!("duplicate call id '{}'", call.id),
                });
            }
        }

        if step.tool_results.is_empty() {
            return Ok(());
        }
        if step.tool_calls.is_empty() {
            return Err(MemoryError::MisalignedResults {
                reason: format!("{} results but no calls", step.tool_results.len()),
            });
        }
        if step.tool_calls.len() != step.tool_results.len() {
            return Err(MemoryError::MisalignedResults {
                reason: format!(
                    "{} calls, {} results",
                    step.tool_calls.len(),
                    step.tool_results.len()
                ),
            });
        }
        for (call, result) in step.tool_calls.iter().zip(&step.tool_results) {
            if call.id != result.call_id {
                return Err(MemoryError::MisalignedResults {
                    reason: format!(
                        "result for '{}' where call '{}' expected",
                        result.call_id, call.id
                    ),
                });
            }
        }
        Ok(())
    }

    /// Rebuild the full ordered message list from all records.
    ///
    /// Pure function of the current record log; recomputed on every call.
    pub fn to_messages(&self) -> Vec<Message> {
        let mut messages = Vec::new();
        for record in &self.records {
            match record {
                Record::Task(task) => messages.push(Self::task_message(task)),
                Record::Step(step) => Self::push_step_messages(step, &mut messages),
            }
        }
        messages
    }

    fn task_message(task: &TaskRecord) -> Message {
        match &task.content {
            TaskContent::Text(text) => Message::user_text(text.clone()),
            TaskContent::Parts(parts) => Message::user(parts.clone()),
        }
    }

    fn push_step_messages(step: &StepRecord, out: &mut Vec<Message>) {
        let text = step.text.as_deref().filter(|t| !t.is_empty());

        if step.tool_calls.is_empty() {
            // A final-answer step maps to a single assistant message with
            // the response text verbatim. A step with neither calls nor
            // text maps to zero messages; that is a valid terminal state.
            if let Some(text) = text {
                out.push(Message::assistant_text(text));
            }
            return;
        }

        let mut blocks = Vec::new();
        if let Some(thinking) = step.thinking.as_deref().filter(|t| !t.is_empty()) {
            blocks.push(ContentBlock::thinking(thinking));
        }
        if let Some(text) = text {
            blocks.push(ContentBlock::text(text));
        }
        for call in &step.tool_calls {
            blocks.push(ContentBlock::ToolUse {
                id: call.id.clone(),
                name: call.name.clone(),
                input: serde_json::Value::Object(call.arguments.clone()),
            });
        }
        out.push(Message::assistant(blocks));

        if !step.tool_results.is_empty() {
            let result_blocks = step
                .tool_results
                .iter()
                .map(|r| ContentBlock::ToolResult {
                    call_id: r.call_id.clone(),
                    content: r.content.clone(),
                    is_error: r.is_error,
                })
                .collect();
            out.push(Message::user(result_blocks));
        }
    }

    /// Serialize the full record log to JSON.
    pub fn to_json(&self) -> Result<String, MemoryError> {
        serde_json::to_string(self).map_err(|e| MemoryError::Serialization(e.to_string()))
    }

    /// Reload a conversation from its serialized form.
    pub fn from_json(json: &str) -> Result<Self, MemoryError> {
        serde_json::from_str(json).map_err(|e| MemoryError::Serialization(e.to_string()))
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new()
    }
}
