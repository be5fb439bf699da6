//! HTTP fetch tool — GETs a URL and returns the response body.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;
use vireo_core::error::ToolError;
use vireo_core::tool::Tool;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Upper bound on returned body size; the dispatcher applies its own
/// truncation on top, this just avoids holding huge bodies in memory.
const MAX_BODY_CHARS: usize = 200_000;

pub struct HttpFetchTool {
    client: reqwest::Client,
}

impl HttpFetchTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent("vireo-agent")
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpFetchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for HttpFetchTool {
    fn name(&self) -> &str {
        "http_fetch"
    }

    fn description(&self) -> &str {
        "Fetch a URL over HTTP GET and return the response body as text."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch (http or https)"
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": "Request timeout in seconds (default 30)",
                    "default": 30
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<String, ToolError> {
        let url = arguments
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'url' argument".into()))?;

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ToolError::InvalidArguments(
                "URL must start with http:// or https://".into(),
            ));
        }

        let timeout_secs = arguments
            .get("timeout_secs")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let response = self
            .client
            .get(url)
            .timeout(Duration::from_secs(timeout_secs))
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "http_fetch".into(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "http_fetch".into(),
                reason: format!("failed to read body: {e}"),
            })?;

        if !status.is_success() {
            return Err(ToolError::ExecutionFailed {
                tool_name: "http_fetch".into(),
                reason: format!("HTTP {status}"),
            });
        }

        if body.chars().count() > MAX_BODY_CHARS {
            let bounded: String = body.chars().take(MAX_BODY_CHARS).collect();
            Ok(format!("{bounded}\n[response truncated]"))
        } else {
            Ok(body)
        }
    }
}
