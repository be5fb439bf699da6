//! The concurrent tool dispatcher.
//!
//! Executes one turn's finalized tool calls concurrently, returning the
//! results in call order regardless of completion order. Each call is
//! isolated: a failure becomes an error result and never cancels its
//! siblings.

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, warn};
use vireo_config::DispatchConfig;
use vireo_core::error::ToolError;
use vireo_core::progress::{ProgressChannel, ProgressEvent};
use vireo_core::provider::ToolDefinition;
use vireo_core::tool::{LocalToolRegistry, ToolBroker, ToolCall, ToolResult};

/// Where a tool name resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExecRoute {
    Local,
    Remote,
}

/// Dispatches one turn's tool calls across the local registry and the
/// remote broker.
pub struct ToolDispatcher {
    local: Arc<LocalToolRegistry>,
    broker: Arc<dyn ToolBroker>,
    routes: HashMap<String, ExecRoute>,
    progress: ProgressChannel,
    max_result_chars: usize,
    progress_interval: Duration,
}

impl ToolDispatcher {
    /// Build the dispatcher and its route table from the local registry
    /// and the broker's catalog. Routing is resolved here, once, not by
    /// string matching at call time; names nobody advertises still go to
    /// the broker, which is the authority on what exists beyond this
    /// process.
    pub fn new(
        local: Arc<LocalToolRegistry>,
        broker: Arc<dyn ToolBroker>,
        broker_catalog: &[ToolDefinition],
        config: &DispatchConfig,
        progress: ProgressChannel,
    ) -> Self {
        let mut routes = HashMap::new();
        for definition in broker_catalog {
            routes.insert(definition.name.clone(), ExecRoute::Remote);
        }
        // Local registrations win over a broker tool of the same name.
        for name in local.names() {
            routes.insert(name.to_string(), ExecRoute::Local);
        }

        Self {
            local,
            broker,
            routes,
            progress,
            max_result_chars: config.max_result_chars,
            // tokio's interval panics on zero.
            progress_interval: Duration::from_millis(config.progress_interval_ms.max(1)),
        }
    }

    /// Execute all calls concurrently and return one result per call,
    /// index-aligned with the input.
    pub async fn dispatch(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        if calls.is_empty() {
            return Vec::new();
        }
        let total = calls.len();
        let done: Vec<AtomicBool> = (0..total).map(|_| AtomicBool::new(false)).collect();

        let work = join_all(calls.iter().enumerate().map(|(index, call)| {
            let done = &done[index];
            async move {
                self.progress.publish(ProgressEvent::ToolStarted {
                    name: call.name.clone(),
                    index,
                    total,
                });
                debug!(tool = %call.name, call_id = %call.id, "Executing tool call");

                let result = match self.execute_one(call).await {
                    Ok(content) => ToolResult::ok(&call.id, &call.name, self.bound(content)),
                    Err(error) => {
                        warn!(tool = %call.name, error = %error, "Tool execution failed");
                        ToolResult::error(&call.id, &call.name, self.bound(error.to_string()))
                    }
                };

                self.progress.publish(ProgressEvent::ToolFinished {
                    name: call.name.clone(),
                    index,
                    total,
                    is_error: result.is_error,
                });
                done.store(true, Ordering::Relaxed);
                result
            }
        }));
        tokio::pin!(work);

        // Periodic in-flight snapshots on the side channel. The ticker
        // never delays or reorders completion of the calls themselves.
        let mut ticker = interval(self.progress_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await; // the first tick fires immediately

        loop {
            tokio::select! {
                results = &mut work => return results,
                _ = ticker.tick() => {
                    for (index, call) in calls.iter().enumerate() {
                        if !done[index].load(Ordering::Relaxed) {
                            self.progress.publish(ProgressEvent::ToolProgress {
                                name: call.name.clone(),
                                index,
                                total,
                            });
                        }
                    }
                }
            }
        }
    }

    async fn execute_one(&self, call: &ToolCall) -> Result<String, ToolError> {
        let route = self
            .routes
            .get(&call.name)
            .copied()
            .unwrap_or(ExecRoute::Remote);
        match route {
            ExecRoute::Local => {
                let tool = self
                    .local
                    .get(&call.name)
                    .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
                tool.execute(call.arguments.clone()).await
            }
            ExecRoute::Remote => self.broker.call_tool(&call.name, call.arguments.clone()).await,
        }
    }

    fn bound(&self, content: String) -> String {
        truncate_middle(&content, self.max_result_chars)
    }
}

/// Truncate `content` to roughly `max_chars`, keeping the original head
/// and tail around an explicit marker. Content at or under the threshold
/// is returned unchanged.
pub fn truncate_middle(content: &str, max_chars: usize) -> String {
    let length = content.chars().count();
    if length <= max_chars {
        return content.to_string();
    }
    let keep = max_chars / 2;
    let head: String = content.chars().take(keep).collect();
    let tail: String = content.chars().skip(length - keep).collect();
    let omitted = length - 2 * keep;
    format!("{head}\n... [{omitted} characters truncated] ...\n{tail}")
}
