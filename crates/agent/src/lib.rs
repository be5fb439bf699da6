//! # Vireo Agent
//!
//! The agent execution engine. One run follows a **stream → branch →
//! dispatch → append** cycle:
//!
//! 1. **Rebuild** the message list from conversation memory
//! 2. **Stream** a provider turn through the collector (retry-wrapped)
//! 3. **If tool calls**: dispatch them concurrently, append the resolved
//!    step, loop back to 1
//! 4. **If a final answer**: append the step and stop
//!
//! The loop also stops on a fatal provider error or when the step budget
//! runs out. Sub-agents are the same loop built with a filtered tool
//! surface and invoked as one tool call from the parent's dispatcher.

pub mod collector;
pub mod dispatch;
pub mod loop_runner;
pub mod retry;
pub mod subagent;

pub use collector::{CollectedTurn, PartialStep, StreamCollector, StreamDelta};
pub use dispatch::{ToolDispatcher, truncate_middle};
pub use loop_runner::{AgentLoop, AgentOutcome};
pub use retry::RetryPolicy;
pub use subagent::{
    AllowListBroker, DelegateTool, SubAgentProfile, SubAgentRegistry, SubAgentResult,
    SubAgentRunner,
};
