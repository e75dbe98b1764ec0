//! Scripted LLM test double.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::llms::base_llm::{BaseLLM, BaseLLMState, LLMMessage};
use crate::types::usage_metrics::UsageMetrics;
use crate::utilities::errors::LLMError;

/// Replays canned responses in order and records every conversation it sees.
#[derive(Debug)]
pub(crate) struct ScriptedLLM {
    state: BaseLLMState,
    responses: Mutex<VecDeque<Result<String, String>>>,
    pub calls: Mutex<Vec<Vec<LLMMessage>>>,
}

impl ScriptedLLM {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            state: BaseLLMState::new("scripted"),
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a provider failure after the currently scripted responses.
    pub fn then_fail(self, message: &str) -> Self {
        self.responses.lock().push_back(Err(message.to_string()));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl BaseLLM for ScriptedLLM {
    fn model(&self) -> &str {
        &self.state.model
    }

    fn temperature(&self) -> Option<f64> {
        None
    }

    fn stop(&self) -> &[String] {
        &self.state.stop
    }

    async fn acall(&self, messages: &[LLMMessage]) -> Result<String, LLMError> {
        self.calls.lock().push(messages.to_vec());
        let next = self.responses.lock().pop_front();
        match next {
            Some(Ok(text)) => {
                self.state.track_token_usage(10, 5, 0);
                Ok(text)
            }
            Some(Err(message)) => Err(LLMError::InvalidResponse {
                provider: "scripted".to_string(),
                message,
            }),
            None => Err(LLMError::InvalidResponse {
                provider: "scripted".to_string(),
                message: "script exhausted".to_string(),
            }),
        }
    }

    fn get_token_usage_summary(&self) -> UsageMetrics {
        self.state.get_token_usage_summary()
    }
}
