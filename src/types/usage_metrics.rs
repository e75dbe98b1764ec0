//! Token usage metrics for crew execution.

use serde::{Deserialize, Serialize};

/// Track token usage across LLM calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetrics {
    /// Total number of tokens used.
    pub total_tokens: i64,
    /// Number of tokens used in prompts.
    pub prompt_tokens: i64,
    /// Number of cached prompt tokens used.
    pub cached_prompt_tokens: i64,
    /// Number of tokens used in completions.
    pub completion_tokens: i64,
    /// Number of successful requests made.
    pub successful_requests: i64,
}

impl UsageMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add usage metrics from another `UsageMetrics`.
    pub fn add_usage_metrics(&mut self, other: &UsageMetrics) {
        self.total_tokens += other.total_tokens;
        self.prompt_tokens += other.prompt_tokens;
        self.cached_prompt_tokens += other.cached_prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.successful_requests += other.successful_requests;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_usage_metrics() {
        let mut total = UsageMetrics::new();
        let call = UsageMetrics {
            total_tokens: 30,
            prompt_tokens: 20,
            cached_prompt_tokens: 5,
            completion_tokens: 10,
            successful_requests: 1,
        };
        total.add_usage_metrics(&call);
        total.add_usage_metrics(&call);
        assert_eq!(total.total_tokens, 60);
        assert_eq!(total.successful_requests, 2);
        assert_eq!(total.cached_prompt_tokens, 10);
    }
}
