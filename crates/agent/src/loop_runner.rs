//! The agent execution loop.
//!
//! Each step requests one provider turn (retry-wrapped, consumed through
//! the stream collector), then branches: a turn with tool calls is
//! dispatched and appended to memory as a fully-resolved step; a turn
//! without tool calls is the final answer. The loop terminates on a final
//! answer, a fatal provider error, or step budget exhaustion.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use vireo_config::RuntimeConfig;
use vireo_core::error::{MemoryError, ProviderError};
use vireo_core::progress::{ProgressChannel, ProgressEvent};
use vireo_core::provider::{Provider, ToolDefinition, TurnRequest, Usage};
use vireo_core::tool::{LocalToolRegistry, ToolBroker, ToolResult};
use vireo_memory::{ConversationMemory, StepRecord, TaskContent};

use crate::collector::{CollectedTurn, StreamCollector, StreamDelta};
use crate::dispatch::ToolDispatcher;
use crate::retry::RetryPolicy;

/// Terminal outcome of one agent run.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutcome {
    /// The final answer, when the run ended normally
    pub answer: Option<String>,

    /// The terminal error, when it did not
    pub error: Option<String>,

    /// Steps completed (appended to memory)
    pub steps: u32,

    /// Token totals across every provider round-trip in the run
    pub usage: Usage,

    /// Names of every tool invoked, in dispatch order
    pub tools_invoked: Vec<String>,
}

impl AgentOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    fn failed(error: impl Into<String>, steps: u32, usage: Usage, tools: Vec<String>) -> Self {
        Self {
            answer: None,
            error: Some(error.into()),
            steps,
            usage,
            tools_invoked: tools,
        }
    }
}

/// The agent loop: owns the conversation memory and is its only writer.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    dispatcher: ToolDispatcher,
    memory: ConversationMemory,
    system_prompt: String,
    model: String,
    max_tokens: Option<u32>,
    /// Tool catalog sent to the provider; fetched once at construction and
    /// never refreshed mid-conversation.
    catalog: Vec<ToolDefinition>,
    max_steps: u32,
    step_delay: Duration,
    retry: RetryPolicy,
    progress: ProgressChannel,
}

impl AgentLoop {
    /// Construct a loop, fetching the broker's tool catalog once.
    ///
    /// All collaborators are passed in explicitly; there is no global
    /// registry to consult.
    pub async fn new(
        provider: Arc<dyn Provider>,
        local: Arc<LocalToolRegistry>,
        broker: Arc<dyn ToolBroker>,
        system_prompt: impl Into<String>,
        config: &RuntimeConfig,
        progress: ProgressChannel,
    ) -> Result<Self, vireo_core::Error> {
        let remote_catalog = broker.list_tools().await?;
        let mut catalog = local.definitions();
        catalog.extend(remote_catalog.iter().cloned());

        let dispatcher = ToolDispatcher::new(
            local,
            broker,
            &remote_catalog,
            &config.dispatch,
            progress.clone(),
        );

        Ok(Self {
            provider,
            dispatcher,
            memory: ConversationMemory::new(),
            system_prompt: system_prompt.into(),
            model: config.model.clone(),
            max_tokens: Some(config.max_tokens),
            catalog,
            max_steps: config.max_steps,
            step_delay: Duration::from_millis(config.step_delay_ms),
            retry: RetryPolicy::new(&config.retry),
            progress,
        })
    }

    /// Resume from previously serialized memory.
    pub fn with_memory(mut self, memory: ConversationMemory) -> Self {
        self.memory = memory;
        self
    }

    /// The conversation memory (read-only; the loop is the sole writer).
    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Consume the loop, keeping its memory for persistence.
    pub fn into_memory(self) -> ConversationMemory {
        self.memory
    }

    /// Process one task to a terminal state.
    pub async fn run(&mut self, task: TaskContent) -> AgentOutcome {
        self.memory.add_task(task);

        let mut usage = Usage::default();
        let mut tools_invoked: Vec<String> = Vec::new();
        let mut steps = 0u32;

        info!(conversation_id = %self.memory.id(), "Starting agent run");

        for step in 0..self.max_steps {
            if step > 0 {
                // Provider pacing between steps. Applies unconditionally,
                // independent of any rate-limit backoff the previous turn
                // needed.
                tokio::time::sleep(self.step_delay).await;
            }
            self.progress.publish(ProgressEvent::StepStarted { step });
            debug!(step, "Agent step");

            let turn = match self.request_turn().await {
                Ok(turn) => turn,
                Err(error) => {
                    warn!(step, error = %error, "Provider turn failed");
                    return AgentOutcome::failed(error.to_string(), steps, usage, tools_invoked);
                }
            };
            usage.accumulate(turn.usage);

            if !turn.has_tool_calls() {
                // Final answer: append and stop.
                let answer = turn.text.clone();
                if let Err(error) = self.append_step(&turn, Vec::new()) {
                    return AgentOutcome::failed(error.to_string(), steps, usage, tools_invoked);
                }
                steps += 1;
                info!(steps, tokens = usage.total(), "Agent run complete");
                return AgentOutcome {
                    answer: Some(answer),
                    error: None,
                    steps,
                    usage,
                    tools_invoked,
                };
            }

            debug!(tool_count = turn.tool_calls.len(), "Executing tool calls");
            tools_invoked.extend(turn.tool_calls.iter().map(|c| c.name.clone()));

            // Results are collected in a batch and appended once, after
            // the whole turn's dispatch completes.
            let results = self.dispatcher.dispatch(&turn.tool_calls).await;
            if let Err(error) = self.append_step(&turn, results) {
                return AgentOutcome::failed(error.to_string(), steps, usage, tools_invoked);
            }
            steps += 1;
        }

        warn!(max_steps = self.max_steps, "Step budget exhausted");
        AgentOutcome::failed("maximum steps reached", steps, usage, tools_invoked)
    }

    /// One retry-wrapped provider round-trip.
    async fn request_turn(&self) -> Result<CollectedTurn, ProviderError> {
        self.retry.run(&self.progress, || self.stream_once()).await
    }

    /// Open the stream, feed every event through the collector (forwarding
    /// visible deltas to the progress channel), then attach the
    /// out-of-band usage totals.
    async fn stream_once(&self) -> Result<CollectedTurn, ProviderError> {
        let request = TurnRequest {
            model: self.model.clone(),
            system: self.system_prompt.clone(),
            // Always rebuilt fresh from memory, never cached.
            messages: self.memory.to_messages(),
            tools: self.catalog.clone(),
            max_tokens: self.max_tokens,
        };

        let mut stream = self.provider.stream_turn(request).await?;
        let mut collector = StreamCollector::new();

        while let Some(event) = stream.events.recv().await {
            for delta in collector.handle(event?) {
                self.progress.publish(match delta {
                    StreamDelta::Text(text) => ProgressEvent::TextDelta { text },
                    StreamDelta::Thinking(text) => ProgressEvent::ThinkingDelta { text },
                });
            }
        }

        let usage = stream.usage.await.unwrap_or_default();
        Ok(collector.finish(usage))
    }

    fn append_step(
        &mut self,
        turn: &CollectedTurn,
        results: Vec<ToolResult>,
    ) -> Result<(), MemoryError> {
        let mut step = StepRecord::new(self.memory.next_step_index()).with_usage(turn.usage);
        if !turn.text.is_empty() {
            step = step.with_text(&turn.text);
        }
        if !turn.thinking.is_empty() {
            step = step.with_thinking(&turn.thinking);
        }
        step = step.with_tools(turn.tool_calls.clone(), results);
        self.memory.add_step(step)
    }
}
