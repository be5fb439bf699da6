//! # Vireo Tools
//!
//! Built-in local tools: the in-process side of the dispatcher's
//! local-vs-broker split. Everything here resolves without a network hop
//! to the tool broker (http_fetch talks to the open web, not the broker).

pub mod calculator;
pub mod current_time;
pub mod http_fetch;

pub use calculator::CalculatorTool;
pub use current_time::CurrentTimeTool;
pub use http_fetch::HttpFetchTool;

use std::sync::Arc;
use vireo_core::tool::LocalToolRegistry;

/// Build a registry holding every built-in local tool.
pub fn builtin_registry() -> LocalToolRegistry {
    let mut registry = LocalToolRegistry::new();
    registry.register(Arc::new(CalculatorTool));
    registry.register(Arc::new(CurrentTimeTool));
    registry.register(Arc::new(HttpFetchTool::new()));
    registry
}
