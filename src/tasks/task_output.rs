//! Task output representation and formatting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::output_format::OutputFormat;
use crate::llms::base_llm::LLMMessage;

/// The result of a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutput {
    pub description: String,
    pub name: Option<String>,
    pub expected_output: Option<String>,
    /// First ten words of the description followed by `...`.
    pub summary: Option<String>,
    /// Raw output of the task.
    pub raw: String,
    /// Parsed JSON output, when the task asked for JSON.
    pub json_dict: Option<Value>,
    /// Role of the agent that executed the task.
    pub agent: String,
    pub output_format: OutputFormat,
    #[serde(default)]
    pub messages: Vec<LLMMessage>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl TaskOutput {
    /// Create a new TaskOutput with summary auto-generated from description.
    pub fn new(
        description: String,
        agent: String,
        raw: String,
        output_format: OutputFormat,
    ) -> Self {
        let summary = Self::generate_summary(&description);
        Self {
            description,
            name: None,
            expected_output: None,
            summary: Some(summary),
            raw,
            json_dict: None,
            agent,
            output_format,
            messages: Vec::new(),
            start_time: None,
            end_time: None,
        }
    }

    fn generate_summary(description: &str) -> String {
        let excerpt: String = description
            .split_whitespace()
            .take(10)
            .collect::<Vec<&str>>()
            .join(" ");
        format!("{}...", excerpt)
    }

    /// Wall-clock execution time in seconds, when timing was recorded.
    pub fn execution_duration(&self) -> Option<f64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
            _ => None,
        }
    }

    /// Get the JSON string representation of the task output.
    ///
    /// # Errors
    ///
    /// Returns an error if output format is not JSON.
    pub fn json(&self) -> Result<String, String> {
        if self.output_format != OutputFormat::JSON {
            return Err(
                "Invalid output format requested. \
                 If you would like to access the JSON output, \
                 please make sure to set the output_json property for the task"
                    .to_string(),
            );
        }

        match &self.json_dict {
            Some(value) => serde_json::to_string(value).map_err(|e| e.to_string()),
            None => Ok("null".to_string()),
        }
    }
}

impl fmt::Display for TaskOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.json_dict {
            Some(value) => write!(f, "{}", value),
            None => write!(f, "{}", self.raw),
        }
    }
}
