//! Error types for the Vireo domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

/// The top-level error type for all Vireo operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Rate limit retries exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

impl ProviderError {
    /// Whether the retry policy may re-issue the round-trip after this failure.
    /// Only rate limiting is transient at this layer.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::RateLimited)
    }
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool not allowed for this agent: {0}")]
    NotAllowed(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool broker unavailable: {0}")]
    BrokerUnavailable(String),
}

#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    #[error("Tool results misaligned with tool calls: {reason}")]
    MisalignedResults { reason: String },

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 529,
            message: "Overloaded".into(),
        });
        assert!(err.to_string().contains("529"));
        assert!(err.to_string().contains("Overloaded"));
    }

    #[test]
    fn only_rate_limits_are_retryable() {
        assert!(ProviderError::RateLimited.is_retryable());
        assert!(!ProviderError::Timeout("read".into()).is_retryable());
        assert!(
            !ProviderError::ApiError {
                status_code: 500,
                message: "boom".into()
            }
            .is_retryable()
        );
        assert!(!ProviderError::RetriesExhausted { attempts: 5 }.is_retryable());
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = Error::Tool(ToolError::NotAllowed("shell".into()));
        assert!(err.to_string().contains("shell"));
        assert!(err.to_string().contains("not allowed"));
    }

    #[test]
    fn memory_error_displays_reason() {
        let err = MemoryError::MisalignedResults {
            reason: "2 calls, 1 result".into(),
        };
        assert!(err.to_string().contains("2 calls, 1 result"));
    }
}
