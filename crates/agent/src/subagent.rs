//! Sub-agent runner: restricted child loops for focused delegated
//! subtasks.
//!
//! A profile names the tools a child may use, the prompt it runs under,
//! and its step budget. The runner builds a fresh agent loop per run from
//! parts injected at construction; it never reaches back into the parent
//! loop, and the parent's dispatcher sees the whole run as one tool call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use vireo_config::{RuntimeConfig, SubAgentProfileConfig};
use vireo_core::error::ToolError;
use vireo_core::progress::{ProgressChannel, ProgressEvent};
use vireo_core::provider::{Provider, ToolDefinition, Usage};
use vireo_core::tool::{LocalToolRegistry, Tool, ToolBroker};
use vireo_memory::TaskContent;

use crate::loop_runner::AgentLoop;

/// A named sub-agent profile.
#[derive(Debug, Clone, PartialEq)]
pub struct SubAgentProfile {
    pub name: String,

    /// Allow-list of tool names; any other call is rejected
    pub allowed_tools: Vec<String>,

    pub system_prompt: String,

    pub max_steps: u32,
}

impl From<SubAgentProfileConfig> for SubAgentProfile {
    fn from(config: SubAgentProfileConfig) -> Self {
        Self {
            name: config.name,
            allowed_tools: config.tools,
            system_prompt: config.system_prompt,
            max_steps: config.max_steps,
        }
    }
}

/// Profiles available for delegation. Constructed once at startup and
/// passed by reference into whatever needs it.
#[derive(Debug, Clone, Default)]
pub struct SubAgentRegistry {
    profiles: HashMap<String, SubAgentProfile>,
}

impl SubAgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(profiles: &[SubAgentProfileConfig]) -> Self {
        let mut registry = Self::new();
        for profile in profiles {
            registry.register(profile.clone().into());
        }
        registry
    }

    /// Register a profile. Replaces any existing profile with the same name.
    pub fn register(&mut self, profile: SubAgentProfile) {
        self.profiles.insert(profile.name.clone(), profile);
    }

    pub fn get(&self, name: &str) -> Option<&SubAgentProfile> {
        self.profiles.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.profiles.keys().map(|s| s.as_str()).collect()
    }
}

/// A broker wrapper enforcing a profile's tool allow-list.
///
/// `list_tools` filters the catalog so the child never sees a forbidden
/// tool; `call_tool` still rejects anything off the list explicitly, never
/// silently dropping or substituting the call.
pub struct AllowListBroker {
    inner: Arc<dyn ToolBroker>,
    allowed: Vec<String>,
}

impl AllowListBroker {
    pub fn new(inner: Arc<dyn ToolBroker>, allowed: Vec<String>) -> Self {
        Self { inner, allowed }
    }

    fn permits(&self, name: &str) -> bool {
        self.allowed.iter().any(|a| a == name)
    }
}

#[async_trait]
impl ToolBroker for AllowListBroker {
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ToolError> {
        Ok(self
            .inner
            .list_tools()
            .await?
            .into_iter()
            .filter(|d| self.permits(&d.name))
            .collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<String, ToolError> {
        if !self.permits(name) {
            return Err(ToolError::NotAllowed(name.to_string()));
        }
        self.inner.call_tool(name, arguments).await
    }
}

/// Outcome of a delegated run, folded into a single structured result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubAgentResult {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub steps: u32,

    pub usage: Usage,

    pub tools_invoked: Vec<String>,
}

impl SubAgentResult {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            steps: 0,
            usage: Usage::default(),
            tools_invoked: Vec::new(),
        }
    }
}

/// Builds and runs restricted child agent loops.
///
/// Everything a child loop needs (provider, registries, broker, config)
/// is a plain constructor parameter, so the runner and the loop module
/// need no registration step to find each other.
pub struct SubAgentRunner {
    registry: SubAgentRegistry,
    provider: Arc<dyn Provider>,
    local: Arc<LocalToolRegistry>,
    broker: Arc<dyn ToolBroker>,
    config: RuntimeConfig,
    progress: ProgressChannel,
}

impl SubAgentRunner {
    pub fn new(
        registry: SubAgentRegistry,
        provider: Arc<dyn Provider>,
        local: Arc<LocalToolRegistry>,
        broker: Arc<dyn ToolBroker>,
        config: RuntimeConfig,
        progress: ProgressChannel,
    ) -> Self {
        Self {
            registry,
            provider,
            local,
            broker,
            config,
            progress,
        }
    }

    /// Run the named profile against a task description to completion.
    pub async fn run(&self, profile_name: &str, task: &str) -> SubAgentResult {
        let Some(profile) = self.registry.get(profile_name) else {
            return SubAgentResult::failed(format!(
                "unknown sub-agent profile '{profile_name}'"
            ));
        };

        info!(profile = %profile.name, "Spawning sub-agent");
        self.progress.publish(ProgressEvent::SubAgentStarted {
            profile: profile.name.clone(),
        });

        // The allow-list applies to the whole tool surface: a filtered
        // local registry view and a rejecting broker wrapper.
        let local = Arc::new(self.local.filtered(&profile.allowed_tools));
        let broker: Arc<dyn ToolBroker> = Arc::new(AllowListBroker::new(
            self.broker.clone(),
            profile.allowed_tools.clone(),
        ));

        let mut config = self.config.clone();
        config.max_steps = profile.max_steps;

        let child = AgentLoop::new(
            self.provider.clone(),
            local,
            broker,
            &profile.system_prompt,
            &config,
            self.progress.clone(),
        )
        .await;

        let result = match child {
            Ok(mut child_loop) => {
                let outcome = child_loop.run(TaskContent::text(task)).await;
                SubAgentResult {
                    success: outcome.is_success(),
                    result: outcome.answer,
                    error: outcome.error,
                    steps: outcome.steps,
                    usage: outcome.usage,
                    tools_invoked: outcome.tools_invoked,
                }
            }
            Err(error) => {
                warn!(profile = %profile.name, error = %error, "Sub-agent construction failed");
                SubAgentResult::failed(error.to_string())
            }
        };

        self.progress.publish(ProgressEvent::SubAgentFinished {
            profile: profile.name.clone(),
            success: result.success,
        });
        result
    }
}

/// Exposes the runner to a parent dispatcher as one local tool. The
/// parent gets the child's whole run as a single JSON-encoded result.
pub struct DelegateTool {
    runner: Arc<SubAgentRunner>,
}

impl DelegateTool {
    pub fn new(runner: Arc<SubAgentRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Tool for DelegateTool {
    fn name(&self) -> &str {
        "delegate"
    }

    fn description(&self) -> &str {
        "Delegate a focused subtask to a restricted sub-agent profile and return its structured outcome."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "profile": {
                    "type": "string",
                    "description": "Name of the sub-agent profile to run"
                },
                "task": {
                    "type": "string",
                    "description": "The subtask description for the sub-agent"
                }
            },
            "required": ["profile", "task"]
        })
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<String, ToolError> {
        let profile = arguments
            .get("profile")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'profile' argument".into()))?;
        let task = arguments
            .get("task")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'task' argument".into()))?;

        let result = self.runner.run(profile, task).await;
        serde_json::to_string_pretty(&result).map_err(|e| ToolError::ExecutionFailed {
            tool_name: "delegate".into(),
            reason: e.to_string(),
        })
    }
}
