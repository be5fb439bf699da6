//! Progress events — the observability side channel.
//!
//! The agent loop, dispatcher, and retry policy publish partial-step
//! progress here for a UI or logger to consume. Publishing is drop-safe:
//! a slow or absent consumer never blocks or reorders the work producing
//! the events.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Events emitted while a turn is in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A new agent step began.
    StepStarted { step: u32 },

    /// Partial response text from the model.
    TextDelta { text: String },

    /// Partial reasoning text from the model.
    ThinkingDelta { text: String },

    /// A tool call was launched.
    ToolStarted {
        name: String,
        index: usize,
        total: usize,
    },

    /// A tool call is still running (periodic snapshot).
    ToolProgress {
        name: String,
        index: usize,
        total: usize,
    },

    /// A tool call completed.
    ToolFinished {
        name: String,
        index: usize,
        total: usize,
        is_error: bool,
    },

    /// The provider rate-limited us; the loop is waiting before retrying.
    RateLimitWait { attempt: u32, delay_secs: f64 },

    /// A delegated sub-agent run started.
    SubAgentStarted { profile: String },

    /// A delegated sub-agent run finished.
    SubAgentFinished { profile: String, success: bool },
}

impl ProgressEvent {
    /// Stable event name for wire protocols (SSE event field, log tag).
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StepStarted { .. } => "step_started",
            Self::TextDelta { .. } => "text_delta",
            Self::ThinkingDelta { .. } => "thinking_delta",
            Self::ToolStarted { .. } => "tool_started",
            Self::ToolProgress { .. } => "tool_progress",
            Self::ToolFinished { .. } => "tool_finished",
            Self::RateLimitWait { .. } => "rate_limit_wait",
            Self::SubAgentStarted { .. } => "subagent_started",
            Self::SubAgentFinished { .. } => "subagent_finished",
        }
    }
}

/// A broadcast-based channel for progress events.
///
/// Built on `tokio::sync::broadcast`: consumers that lag drop the oldest
/// events, and publishing with no subscribers is a no-op.
#[derive(Clone)]
pub struct ProgressChannel {
    sender: broadcast::Sender<ProgressEvent>,
}

impl ProgressChannel {
    /// Create a new channel with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: ProgressEvent) {
        // Ignore send errors (no subscribers = that's fine)
        let _ = self.sender.send(event);
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    /// Subscribe as a `Stream` for async iteration.
    pub fn stream(&self) -> BroadcastStream<ProgressEvent> {
        BroadcastStream::new(self.sender.subscribe())
    }
}

impl Default for ProgressChannel {
    fn default() -> Self {
        Self::new(256)
    }
}
