//! Current-time tool — returns the current UTC timestamp.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use vireo_core::error::ToolError;
use vireo_core::tool::Tool;

pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Get the current date and time in UTC. Optionally accepts a strftime format string."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "format": {
                    "type": "string",
                    "description": "Optional strftime format, e.g. '%Y-%m-%d'. Defaults to RFC 3339."
                }
            }
        })
    }

    async fn execute(&self, arguments: Map<String, Value>) -> Result<String, ToolError> {
        let now = Utc::now();
        match arguments.get("format").and_then(|v| v.as_str()) {
            Some(format) => Ok(now.format(format).to_string()),
            None => Ok(now.to_rfc3339()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_format_is_rfc3339() {
        let tool = CurrentTimeTool;
        let output = tool.execute(Map::new()).await.unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&output).is_ok());
    }

    #[tokio::test]
    async fn custom_format_applies() {
        let tool = CurrentTimeTool;
        let mut arguments = Map::new();
        arguments.insert("format".into(), Value::String("%Y".into()));
        let output = tool.execute(arguments).await.unwrap();
        assert_eq!(output.len(), 4);
        assert!(output.chars().all(|c| c.is_ascii_digit()));
    }
}
