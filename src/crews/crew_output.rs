//! Crew output representation.
//!
//! Holds the final task's raw and JSON output, every task output in
//! execution order, and the token usage of the run.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::tasks::output_format::OutputFormat;
use crate::tasks::task_output::TaskOutput;
use crate::types::usage_metrics::UsageMetrics;

/// The result of a crew run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrewOutput {
    /// Raw output of the final task.
    pub raw: String,
    /// JSON output of the final task.
    pub json_dict: Option<Value>,
    /// Output of each task.
    pub tasks_output: Vec<TaskOutput>,
    /// Processed token summary.
    pub token_usage: UsageMetrics,
}

impl CrewOutput {
    pub fn new(raw: String, tasks_output: Vec<TaskOutput>, token_usage: UsageMetrics) -> Self {
        Self {
            raw,
            json_dict: None,
            tasks_output,
            token_usage,
        }
    }

    /// Get the JSON string representation of the crew output.
    ///
    /// # Errors
    ///
    /// Returns an error if the final task output format is not JSON.
    pub fn json(&self) -> Result<String, String> {
        if let Some(last) = self.tasks_output.last() {
            if last.output_format != OutputFormat::JSON {
                return Err(
                    "No JSON output found in the final task. \
                     Please make sure to set the output_json property in the final task in your crew."
                        .to_string(),
                );
            }
        }

        match &self.json_dict {
            Some(value) => serde_json::to_string(value).map_err(|e| e.to_string()),
            None => Ok("null".to_string()),
        }
    }

    /// Get a top-level value from the JSON output.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.json_dict.as_ref().and_then(|value| value.get(key))
    }
}

impl fmt::Display for CrewOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.json_dict {
            Some(value) => write!(f, "{}", value),
            None => write!(f, "{}", self.raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_and_get() {
        let mut task = TaskOutput::new("d".into(), "a".into(), "{}".into(), OutputFormat::JSON);
        task.json_dict = Some(json!({"Cafe": 4.5}));
        let mut output = CrewOutput::new("{}".into(), vec![task], UsageMetrics::new());
        output.json_dict = Some(json!({"Cafe": 4.5}));

        assert_eq!(output.get("Cafe"), Some(&json!(4.5)));
        assert_eq!(output.get("Other"), None);
        assert_eq!(output.json().unwrap(), "{\"Cafe\":4.5}");
    }

    #[test]
    fn test_json_rejects_raw_final_task() {
        let task = TaskOutput::new("d".into(), "a".into(), "text".into(), OutputFormat::Raw);
        let output = CrewOutput::new("text".into(), vec![task], UsageMetrics::new());
        assert!(output.json().is_err());
        assert_eq!(output.to_string(), "text");
    }
}
