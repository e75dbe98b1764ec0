//! Error types shared across the crew runtime.

use thiserror::Error;

/// Errors raised while talking to an LLM provider.
#[derive(Debug, Error)]
pub enum LLMError {
    /// No API key was configured for the provider.
    #[error("{provider} API key not set. Set GOOGLE_API_KEY or GEMINI_API_KEY environment variable.")]
    MissingApiKey { provider: String },

    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-retryable error status.
    #[error("{provider} API error ({status}): {body}")]
    Api {
        provider: String,
        status: u16,
        body: String,
    },

    /// The provider answered with something we could not interpret.
    #[error("Invalid {provider} response: {message}")]
    InvalidResponse { provider: String, message: String },

    /// All retry attempts were used up.
    #[error("{provider} API call failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        provider: String,
        attempts: u32,
        last_error: String,
    },

    /// The blocking wrapper could not start a runtime.
    #[error("failed to start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Errors raised by tool execution.
///
/// The message is what the agent sees as its observation, so each variant
/// renders with the prefix the agent prompt documents.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Arguments could not be parsed or a required argument is missing.
    #[error("Invalid arguments for tool '{tool}': {message}")]
    InvalidArguments { tool: String, message: String },

    /// The tool has been used the maximum number of times.
    #[error("Tool '{tool}' has reached its maximum usage limit of {limit}. You should not use the {tool} tool again.")]
    UsageLimitExceeded { tool: String, limit: u32 },

    /// The tool ran and failed.
    #[error("{0}")]
    Execution(String),
}

/// Errors from task, agent and crew execution.
#[derive(Debug, Error)]
pub enum CrewError {
    /// The task has no agent and cannot be executed directly.
    #[error("The task '{0}' has no agent assigned, therefore it can't be executed directly.")]
    NoAgentAssigned(String),

    /// The task names an agent role the crew does not know.
    #[error("No registered agent found for role '{0}'")]
    UnknownAgent(String),

    /// The underlying LLM call failed.
    #[error(transparent)]
    Llm(#[from] LLMError),

    /// The crew has no tasks or no task produced output.
    #[error("No valid task outputs available to create crew output.")]
    NoOutputs,

    /// Writing a task output file failed.
    #[error("Failed to save output file '{path}': {source}")]
    OutputFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_messages_are_agent_readable() {
        let err = ToolError::UsageLimitExceeded {
            tool: "read_json_file".to_string(),
            limit: 2,
        };
        assert!(err.to_string().contains("maximum usage limit of 2"));

        let err = ToolError::Execution("Error reading PDF: not a pdf".to_string());
        assert_eq!(err.to_string(), "Error reading PDF: not a pdf");
    }

    #[test]
    fn test_crew_error_from_llm_error() {
        let err: CrewError = LLMError::MissingApiKey {
            provider: "Gemini".to_string(),
        }
        .into();
        assert!(matches!(err, CrewError::Llm(_)));
        assert!(err.to_string().starts_with("Gemini API key not set"));
    }
}
