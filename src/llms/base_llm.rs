//! Base LLM trait and shared provider state.
//!
//! Provides the trait every LLM implementation follows, plus common
//! functionality for native providers: token usage tracking, message
//! helpers, stop word handling, and call event logging.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::types::usage_metrics::UsageMetrics;
use crate::utilities::errors::LLMError;

/// Default context window size in tokens.
pub const DEFAULT_CONTEXT_WINDOW_SIZE: usize = 4096;

/// Default support for stop words.
pub const DEFAULT_SUPPORTS_STOP_WORDS: bool = true;

static JSON_OBJECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());
static JSON_ARRAY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[.*\]").unwrap());

/// A single message in an LLM conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LLMMessage {
    /// Role of the message sender ("system", "user", "assistant").
    pub role: String,
    /// Text content of the message.
    pub content: String,
}

impl LLMMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// Generate a unique call ID for an LLM call.
pub fn generate_call_id() -> String {
    Uuid::new_v4().to_string()
}

static CALL_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Get the next call sequence number.
pub fn next_call_sequence() -> usize {
    CALL_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Base trait for LLM implementations.
///
/// Implementations must be shareable across agents, so all methods take
/// `&self`; usage counters live behind interior mutability.
#[async_trait]
pub trait BaseLLM: Send + Sync + fmt::Debug {
    /// Model identifier.
    fn model(&self) -> &str;

    /// Sampling temperature, if set.
    fn temperature(&self) -> Option<f64>;

    /// Stop sequences sent with every request.
    fn stop(&self) -> &[String];

    /// Provider name.
    fn provider(&self) -> &str {
        "custom"
    }

    fn supports_stop_words(&self) -> bool {
        DEFAULT_SUPPORTS_STOP_WORDS
    }

    fn get_context_window_size(&self) -> usize {
        DEFAULT_CONTEXT_WINDOW_SIZE
    }

    /// Call the LLM with a conversation and return the response text.
    async fn acall(&self, messages: &[LLMMessage]) -> Result<String, LLMError>;

    /// Blocking variant of [`BaseLLM::acall`].
    ///
    /// Must not be called from inside a Tokio runtime.
    fn call(&self, messages: &[LLMMessage]) -> Result<String, LLMError> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        rt.block_on(self.acall(messages))
    }

    /// Cumulative token usage of this instance.
    fn get_token_usage_summary(&self) -> UsageMetrics;
}

/// Shared state for LLM implementations.
///
/// Concrete providers embed this and delegate to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseLLMState {
    /// The model identifier.
    pub model: String,
    /// Optional temperature setting for response generation.
    pub temperature: Option<f64>,
    /// Optional API key.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Optional base URL for the API.
    pub base_url: Option<String>,
    /// Stop sequences that end generation.
    pub stop: Vec<String>,
    /// Provider name (e.g., "gemini").
    pub provider: String,
    #[serde(skip)]
    token_usage: Arc<Mutex<UsageMetrics>>,
}

impl BaseLLMState {
    /// Create a new `BaseLLMState` with the given model name.
    ///
    /// # Panics
    ///
    /// Panics if `model` is empty.
    pub fn new(model: impl Into<String>) -> Self {
        let model = model.into();
        assert!(!model.is_empty(), "Model name is required and cannot be empty");

        Self {
            model,
            temperature: None,
            api_key: None,
            base_url: None,
            stop: Vec::new(),
            provider: "custom".to_string(),
            token_usage: Arc::new(Mutex::new(UsageMetrics::default())),
        }
    }

    /// Truncate `content` at the earliest configured stop word.
    pub fn apply_stop_words(&self, content: &str) -> String {
        if self.stop.is_empty() || content.is_empty() {
            return content.to_string();
        }

        let earliest = self
            .stop
            .iter()
            .filter_map(|word| content.find(word.as_str()).map(|pos| (pos, word)))
            .min_by_key(|(pos, _)| *pos);

        match earliest {
            Some((pos, word)) => {
                log::debug!("Applied stop word '{}' at position {}", word, pos);
                content[..pos].trim().to_string()
            }
            None => content.to_string(),
        }
    }

    /// Wrap a plain string as a single user message.
    pub fn string_to_messages(text: &str) -> Vec<LLMMessage> {
        vec![LLMMessage::user(text)]
    }

    /// Accumulate one successful request's token counts.
    pub fn track_token_usage(&self, prompt_tokens: i64, completion_tokens: i64, cached_tokens: i64) {
        let mut usage = self.token_usage.lock();
        usage.prompt_tokens += prompt_tokens;
        usage.completion_tokens += completion_tokens;
        usage.total_tokens += prompt_tokens + completion_tokens;
        usage.cached_prompt_tokens += cached_tokens;
        usage.successful_requests += 1;
    }

    pub fn get_token_usage_summary(&self) -> UsageMetrics {
        self.token_usage.lock().clone()
    }

    /// Parse structured output from a response string.
    ///
    /// Tries the whole (trimmed, fence-stripped) response first, then the
    /// outermost `{...}` span, then the outermost `[...]` span.
    pub fn validate_structured_output(response: &str) -> Result<Value, LLMError> {
        let trimmed = strip_code_fence(response.trim());
        if let Ok(val) = serde_json::from_str::<Value>(trimmed) {
            if val.is_object() || val.is_array() {
                return Ok(val);
            }
        }

        for re in [&*JSON_OBJECT_RE, &*JSON_ARRAY_RE] {
            if let Some(m) = re.find(response) {
                if let Ok(val) = serde_json::from_str::<Value>(m.as_str()) {
                    return Ok(val);
                }
            }
        }

        Err(LLMError::InvalidResponse {
            provider: "llm".to_string(),
            message: "No JSON found in response".to_string(),
        })
    }
}

/// Remove a surrounding Markdown code fence (```json ... ```), if any.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Log the start of an LLM call.
pub fn emit_call_started_event(model: &str, messages: &[LLMMessage], call_id: &str) {
    log::debug!(
        "LLM call started: model={}, call_id={}, seq={}, messages={}",
        model,
        call_id,
        next_call_sequence(),
        messages.len()
    );
}

/// Log the completion of an LLM call.
pub fn emit_call_completed_event(model: &str, call_id: &str, response_len: usize) {
    log::debug!(
        "LLM call completed: model={}, call_id={}, response_len={}",
        model,
        call_id,
        response_len
    );
}

/// Log a failed LLM call.
pub fn emit_call_failed_event(model: &str, error: &str, call_id: &str) {
    log::warn!(
        "LLM call failed: model={}, error={}, call_id={}",
        model,
        error,
        call_id
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_llm_state_new() {
        let state = BaseLLMState::new("gemini-1.5-flash");
        assert_eq!(state.model, "gemini-1.5-flash");
        assert!(state.stop.is_empty());
        assert_eq!(state.get_token_usage_summary(), UsageMetrics::default());
    }

    #[test]
    #[should_panic(expected = "Model name is required")]
    fn test_base_llm_state_empty_model() {
        BaseLLMState::new("");
    }

    #[test]
    fn test_apply_stop_words() {
        let mut state = BaseLLMState::new("test-model");
        state.stop = vec!["Observation:".to_string(), "Final Answer:".to_string()];

        let content = "I need to search.\n\nAction: search\nObservation: Found results";
        assert_eq!(
            state.apply_stop_words(content),
            "I need to search.\n\nAction: search"
        );
    }

    #[test]
    fn test_apply_stop_words_no_match() {
        let mut state = BaseLLMState::new("test-model");
        state.stop = vec!["STOP".to_string()];
        assert_eq!(state.apply_stop_words("No stop word here"), "No stop word here");
    }

    #[test]
    fn test_token_usage_shared_between_clones() {
        let state = BaseLLMState::new("test");
        let clone = state.clone();
        state.track_token_usage(100, 50, 10);
        clone.track_token_usage(1, 1, 0);

        let usage = state.get_token_usage_summary();
        assert_eq!(usage.prompt_tokens, 101);
        assert_eq!(usage.completion_tokens, 51);
        assert_eq!(usage.total_tokens, 152);
        assert_eq!(usage.successful_requests, 2);
        assert_eq!(usage.cached_prompt_tokens, 10);
    }

    #[test]
    fn test_validate_structured_output() {
        let result = BaseLLMState::validate_structured_output(r#"{"key": "value"}"#).unwrap();
        assert_eq!(result["key"], "value");

        let mixed = "Here you go:\n{\"Cafe\": 12.5,\n \"Shop\": 3}\nDone.";
        let result = BaseLLMState::validate_structured_output(mixed).unwrap();
        assert_eq!(result["Cafe"], 12.5);

        let fenced = "```json\n[{\"company_name\": \"A\", \"total_amount\": \"1\"}]\n```";
        let result = BaseLLMState::validate_structured_output(fenced).unwrap();
        assert_eq!(result[0]["company_name"], "A");

        assert!(BaseLLMState::validate_structured_output("No JSON here").is_err());
    }

    #[test]
    fn test_message_constructors() {
        assert_eq!(LLMMessage::system("s").role, "system");
        assert_eq!(LLMMessage::assistant("a").role, "assistant");
        assert_eq!(BaseLLMState::string_to_messages("Hello!"), vec![LLMMessage::user("Hello!")]);
    }

    #[test]
    fn test_generate_call_id() {
        let id1 = generate_call_id();
        let id2 = generate_call_id();
        assert_ne!(id1, id2);
        assert_eq!(id1.len(), 36);
    }

    #[test]
    fn test_blocking_call_and_default_capabilities() {
        use crate::llms::testing::ScriptedLLM;

        let llm = ScriptedLLM::new(["Final Answer: 42"]);
        assert!(llm.supports_stop_words());
        assert_eq!(llm.get_context_window_size(), DEFAULT_CONTEXT_WINDOW_SIZE);
        assert_eq!(llm.call(&[LLMMessage::user("hi")]).unwrap(), "Final Answer: 42");
        assert!(llm.call(&[LLMMessage::user("again")]).is_err());
        assert_eq!(llm.get_token_usage_summary().successful_requests, 1);
    }
}
