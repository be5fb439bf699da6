//! Tool abstractions: in-process tools, the local registry, and the
//! remote tool broker seam.
//!
//! The dispatcher consults the local registry first; anything not
//! registered there is forwarded to the broker.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// A request to execute a tool, as finalized from the response stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID, stable across the call/result lifecycle
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// The parsed argument object
    pub arguments: Map<String, Value>,
}

/// The outcome of one tool call. Content is already size-bounded by the
/// dispatcher before a result is constructed from raw output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result answers
    pub call_id: String,

    /// Name of the tool that ran
    pub name: String,

    /// The output content
    pub content: String,

    /// Whether the call failed
    pub is_error: bool,
}

impl ToolResult {
    /// A successful result.
    pub fn ok(
        call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// A failed result carrying the error message as content.
    pub fn error(
        call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            content: content.into(),
            is_error: true,
        }
    }
}

/// An in-process tool.
///
/// Local tools resolve entirely inside the process, no network hop. They
/// return raw output; the dispatcher owns result assembly and truncation.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "calculator").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given argument object.
    async fn execute(&self, arguments: Map<String, Value>)
    -> std::result::Result<String, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// The registry of in-process tools.
///
/// Tools are held behind `Arc` so a filtered view (for sub-agents) shares
/// the same instances instead of re-registering them.
pub struct LocalToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl LocalToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Whether a tool with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get all tool definitions (for sending to the LLM).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// A view containing only the tools whose names pass the filter.
    pub fn filtered(&self, allowed: &[String]) -> Self {
        Self {
            tools: self
                .tools
                .iter()
                .filter(|(name, _)| allowed.iter().any(|a| a == *name))
                .map(|(name, tool)| (name.clone(), tool.clone()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for LocalToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The external tool broker: executes tools not implemented in-process.
///
/// The broker's own protocol (transport, auth) is its implementation's
/// concern; the engine treats it as an async request/response capability.
#[async_trait]
pub trait ToolBroker: Send + Sync {
    /// Fetch the broker's tool catalog.
    async fn list_tools(&self) -> std::result::Result<Vec<ToolDefinition>, ToolError>;

    /// Execute a tool by name and return its raw output.
    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> std::result::Result<String, ToolError>;
}
