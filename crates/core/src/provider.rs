//! Provider trait — the abstraction over LLM backends.
//!
//! A provider turns one request into an ordered stream of typed events
//! (text deltas, thinking deltas, tool-call fragments) followed by usage
//! totals that arrive out-of-band once the event sequence ends. The engine
//! never sees a vendor wire format; adapters translate SSE or whatever
//! else the backend speaks into `ProviderEvent`s.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::error::ProviderError;
use crate::message::Message;

/// Token usage totals for one provider turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    /// Fold another turn's totals into this one.
    pub fn accumulate(&mut self, other: Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }

    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// The kind of content block a `BlockStart` event opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockKind {
    Text,
    Thinking,
    ToolUse { id: String, name: String },
    /// Block kinds this runtime does not understand.
    Other,
}

/// One event in a provider's response stream.
///
/// Position indexes identify the content block an event belongs to, so
/// interleaved tool-argument fragments can be routed to the right call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderEvent {
    /// A new content block opened at `index`.
    BlockStart { index: usize, kind: BlockKind },

    /// A fragment of visible response text.
    TextDelta { text: String },

    /// A fragment of reasoning text.
    ThinkingDelta { text: String },

    /// A fragment of the JSON argument object for the tool call open at `index`.
    ToolArgsDelta { index: usize, partial_json: String },

    /// The content block at `index` closed.
    BlockStop { index: usize },

    /// An event kind this runtime does not understand. Consumers must
    /// ignore it rather than fail the turn.
    Other,
}

/// A request for one provider turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    /// The model to use
    pub model: String,

    /// System prompt, sent as a top-level field rather than a message
    pub system: String,

    /// The full message list, rebuilt fresh from conversation memory
    pub messages: Vec<Message>,

    /// Tool catalog the model may call from
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// A live provider turn: the ordered event stream, plus the usage totals
/// delivered out-of-band after the event sequence ends.
pub struct TurnStream {
    pub events: mpsc::Receiver<std::result::Result<ProviderEvent, ProviderError>>,
    pub usage: oneshot::Receiver<Usage>,
}

/// The core Provider trait.
///
/// Every LLM backend implements this; the agent loop calls `stream_turn`
/// without knowing which backend is behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider.
    fn name(&self) -> &str;

    /// Send a request and get a live event stream back.
    async fn stream_turn(
        &self,
        request: TurnRequest,
    ) -> std::result::Result<TurnStream, ProviderError>;
}
