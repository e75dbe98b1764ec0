//! Google Gemini native completion provider.
//!
//! Talks to the Gemini `generateContent` REST endpoint directly.
//!
//! # Authentication
//!
//! Uses the explicit API key if given, otherwise `GOOGLE_API_KEY`, then
//! `GEMINI_API_KEY`. The key is sent in the `x-goog-api-key` header, never in
//! the URL, so transport errors cannot echo it.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::llms::base_llm::{
    emit_call_completed_event, emit_call_failed_event, emit_call_started_event, generate_call_id,
    BaseLLM, BaseLLMState, LLMMessage,
};
use crate::types::usage_metrics::UsageMetrics;
use crate::utilities::errors::LLMError;

/// Public Gemini API base URL.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini accepts at most this many stop sequences.
pub const MAX_STOP_SEQUENCES: usize = 5;

const PROVIDER: &str = "Gemini";
const MAX_RETRIES: u32 = 2;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Token counts reported in a response's `usageMetadata`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeminiUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub cached_tokens: i64,
}

/// Google Gemini completion implementation.
///
/// # Example
///
/// ```ignore
/// let provider = GeminiCompletion::new("gemini-1.5-flash", None).with_temperature(0.1);
/// let answer = provider.acall(&[LLMMessage::user("Hello")]).await?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiCompletion {
    #[serde(flatten)]
    pub state: BaseLLMState,
    /// Nucleus sampling parameter.
    pub top_p: Option<f64>,
    /// Top-K sampling parameter.
    pub top_k: Option<u32>,
    /// Maximum output tokens.
    pub max_output_tokens: Option<u32>,
    /// Safety filter settings, passed through verbatim.
    pub safety_settings: Option<Value>,
    /// First backoff delay between retries; doubles after each attempt.
    #[serde(skip)]
    pub retry_delay: Option<Duration>,
}

impl GeminiCompletion {
    /// Create a new Gemini provider.
    ///
    /// `api_key` falls back to `GOOGLE_API_KEY`, then `GEMINI_API_KEY`.
    pub fn new(model: impl Into<String>, api_key: Option<String>) -> Self {
        let api_key = api_key
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .or_else(|| std::env::var("GEMINI_API_KEY").ok());

        let mut state = BaseLLMState::new(model);
        state.api_key = api_key;
        state.provider = "gemini".to_string();

        Self {
            state,
            top_p: None,
            top_k: None,
            max_output_tokens: None,
            safety_settings: None,
            retry_delay: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.state.temperature = Some(temperature);
        self
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.state.stop = stop;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Override the API base URL (for proxies and local test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.state.base_url = Some(base_url.into());
        self
    }

    fn api_endpoint(&self) -> String {
        let base = self
            .state
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        format!("{}/v1beta/models/{}:generateContent", base, self.state.model)
    }

    /// Build the `generationConfig` object.
    pub fn generation_config(&self) -> Value {
        let mut config = serde_json::Map::new();
        if let Some(temp) = self.state.temperature {
            config.insert("temperature".to_string(), json!(temp));
        }
        if let Some(max_tokens) = self.max_output_tokens {
            config.insert("maxOutputTokens".to_string(), json!(max_tokens));
        }
        if let Some(top_p) = self.top_p {
            config.insert("topP".to_string(), json!(top_p));
        }
        if let Some(top_k) = self.top_k {
            config.insert("topK".to_string(), json!(top_k));
        }
        if !self.state.stop.is_empty() {
            if self.state.stop.len() > MAX_STOP_SEQUENCES {
                log::warn!(
                    "Gemini supports at most {} stop sequences, dropping {}",
                    MAX_STOP_SEQUENCES,
                    self.state.stop.len() - MAX_STOP_SEQUENCES
                );
            }
            let stop: Vec<&String> = self.state.stop.iter().take(MAX_STOP_SEQUENCES).collect();
            config.insert("stopSequences".to_string(), json!(stop));
        }
        Value::Object(config)
    }

    /// Convert chat messages to Gemini `contents` plus an optional system instruction.
    ///
    /// System messages are joined into one instruction; `assistant` becomes
    /// `model` and every other role becomes `user`.
    fn format_messages(messages: &[LLMMessage]) -> (Option<String>, Vec<Value>) {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut contents: Vec<Value> = Vec::new();

        for msg in messages {
            match msg.role.as_str() {
                "system" => system_parts.push(&msg.content),
                role => {
                    let gemini_role = if role == "assistant" { "model" } else { "user" };
                    contents.push(json!({
                        "role": gemini_role,
                        "parts": [{ "text": msg.content }],
                    }));
                }
            }
        }

        let system = (!system_parts.is_empty()).then(|| system_parts.join("\n\n"));
        (system, contents)
    }

    /// Build the complete request body.
    pub fn build_request_body(&self, messages: &[LLMMessage]) -> Value {
        let (system, contents) = Self::format_messages(messages);

        let mut body = json!({
            "contents": contents,
            "generationConfig": self.generation_config(),
        });

        if let Some(system_text) = system {
            body["systemInstruction"] = json!({ "parts": [{ "text": system_text }] });
        }
        if let Some(ref safety) = self.safety_settings {
            body["safetySettings"] = safety.clone();
        }

        body
    }

    /// Extract the response text from a `generateContent` response.
    pub fn parse_response(&self, response: &Value) -> Result<String, LLMError> {
        if let Some(error) = response.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown Gemini API error");
            return Err(invalid(message));
        }

        let candidate = response
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
            .ok_or_else(|| {
                let reason = response
                    .pointer("/promptFeedback/blockReason")
                    .and_then(Value::as_str);
                match reason {
                    Some(reason) => invalid(&format!("prompt blocked: {}", reason)),
                    None => invalid("no candidates in response"),
                }
            })?;

        let parts = candidate
            .pointer("/content/parts")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                let finish = candidate
                    .get("finishReason")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                invalid(&format!("no content parts (finishReason={})", finish))
            })?;

        let text: String = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect();

        Ok(self.state.apply_stop_words(&text))
    }

    /// Read token counts from `usageMetadata`.
    pub fn extract_token_usage(response: &Value) -> Option<GeminiUsage> {
        let usage = response.get("usageMetadata")?;
        let count = |key: &str| usage.get(key).and_then(Value::as_i64).unwrap_or(0);
        Some(GeminiUsage {
            prompt_tokens: count("promptTokenCount"),
            completion_tokens: count("candidatesTokenCount"),
            cached_tokens: count("cachedContentTokenCount"),
        })
    }

    async fn send_with_retries(&self, api_key: &str, body: &Value) -> Result<Value, LLMError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let endpoint = self.api_endpoint();

        let mut last_error = String::new();
        let mut retry_delay = self.retry_delay.unwrap_or(DEFAULT_RETRY_DELAY);

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                log::warn!("Gemini API retry attempt {} after {:?}", attempt, retry_delay);
                tokio::time::sleep(retry_delay).await;
                retry_delay *= 2;
            }

            let response = match client
                .post(&endpoint)
                .header(API_KEY_HEADER, api_key)
                .json(body)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = e.without_url().to_string();
                    continue;
                }
            };

            let status = response.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                last_error = "rate limited (429)".to_string();
                continue;
            }
            if status.is_server_error() {
                last_error = format!("server error {}", status);
                continue;
            }

            let text = match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    last_error = e.without_url().to_string();
                    continue;
                }
            };

            if status.is_client_error() {
                return Err(LLMError::Api {
                    provider: PROVIDER.to_string(),
                    status: status.as_u16(),
                    body: text,
                });
            }

            return serde_json::from_str(&text).map_err(|e| {
                let preview: String = text.chars().take(500).collect();
                invalid(&format!("{} - Body: {}", e, preview))
            });
        }

        Err(LLMError::RetriesExhausted {
            provider: PROVIDER.to_string(),
            attempts: MAX_RETRIES + 1,
            last_error,
        })
    }
}

fn invalid(message: &str) -> LLMError {
    LLMError::InvalidResponse {
        provider: PROVIDER.to_string(),
        message: message.to_string(),
    }
}

#[async_trait]
impl BaseLLM for GeminiCompletion {
    fn model(&self) -> &str {
        &self.state.model
    }

    fn temperature(&self) -> Option<f64> {
        self.state.temperature
    }

    fn stop(&self) -> &[String] {
        &self.state.stop
    }

    fn provider(&self) -> &str {
        "gemini"
    }

    fn get_context_window_size(&self) -> usize {
        if self.state.model.to_lowercase().contains("1.5-pro") {
            2_097_152
        } else {
            1_048_576
        }
    }

    async fn acall(&self, messages: &[LLMMessage]) -> Result<String, LLMError> {
        let api_key = self
            .state
            .api_key
            .as_deref()
            .ok_or_else(|| LLMError::MissingApiKey {
                provider: PROVIDER.to_string(),
            })?;

        let call_id = generate_call_id();
        emit_call_started_event(&self.state.model, messages, &call_id);

        let body = self.build_request_body(messages);
        let response = match self.send_with_retries(api_key, &body).await {
            Ok(response) => response,
            Err(e) => {
                emit_call_failed_event(&self.state.model, &e.to_string(), &call_id);
                return Err(e);
            }
        };

        if let Some(usage) = Self::extract_token_usage(&response) {
            log::debug!("Gemini usage: {:?}", usage);
            self.state.track_token_usage(
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.cached_tokens,
            );
        }

        let text = self.parse_response(&response)?;
        emit_call_completed_event(&self.state.model, &call_id, text.len());
        Ok(text)
    }

    fn get_token_usage_summary(&self) -> UsageMetrics {
        self.state.get_token_usage_summary()
    }
}
