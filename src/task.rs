//! Main Task struct.
//!
//! A task is a description plus an expected output, assigned to an agent by
//! role. Executing a task runs the agent, optionally parses the answer as
//! JSON, writes the output file and fires the completion callback.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use uuid::Uuid;

use crate::agent::core::interpolate_string;
use crate::agent::Agent;
use crate::llms::base_llm::BaseLLMState;
use crate::tasks::output_format::OutputFormat;
use crate::tasks::task_output::TaskOutput;
use crate::utilities::errors::CrewError;

/// Type alias for a task completion callback.
pub type TaskCallback = Arc<dyn Fn(&TaskOutput) + Send + Sync>;

/// Represents a task to be executed.
#[derive(Clone)]
pub struct Task {
    /// Unique identifier for the task.
    pub id: Uuid,
    pub name: Option<String>,
    /// Descriptive text detailing the task's purpose and execution.
    pub description: String,
    /// Clear definition of expected task outcome.
    pub expected_output: String,
    /// Role of the agent responsible for execution.
    pub agent: Option<String>,
    /// Parse the final answer into a JSON value.
    pub output_json: bool,
    /// File path for storing task output.
    pub output_file: Option<String>,
    /// Whether to create the directory for output_file if it doesn't exist.
    pub create_directory: bool,
    /// Task output, the final result after being executed.
    pub output: Option<TaskOutput>,
    pub callback: Option<TaskCallback>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    original_description: Option<String>,
    original_expected_output: Option<String>,
    original_output_file: Option<String>,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("expected_output", &self.expected_output)
            .field("agent", &self.agent)
            .field("output_json", &self.output_json)
            .field("output_file", &self.output_file)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Task(description={}, expected_output={})",
            self.description, self.expected_output
        )
    }
}

impl Task {
    pub fn new(description: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: None,
            description: description.into(),
            expected_output: expected_output.into(),
            agent: None,
            output_json: false,
            output_file: None,
            create_directory: true,
            output: None,
            callback: None,
            start_time: None,
            end_time: None,
            original_description: None,
            original_expected_output: None,
            original_output_file: None,
        }
    }

    pub fn with_agent(mut self, role: impl Into<String>) -> Self {
        self.agent = Some(role.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_output_json(mut self, output_json: bool) -> Self {
        self.output_json = output_json;
        self
    }

    pub fn with_output_file(mut self, path: impl Into<String>) -> Self {
        self.output_file = Some(path.into());
        self
    }

    pub fn with_callback(mut self, callback: TaskCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Generate the task prompt.
    pub fn prompt(&self) -> String {
        format!(
            "{}\nExpected Output: {}",
            self.description, self.expected_output
        )
    }

    /// Execute the task with `agent`, passing earlier outputs as `context`.
    pub async fn execute(
        &mut self,
        agent: &mut Agent,
        context: Option<&str>,
    ) -> Result<TaskOutput, CrewError> {
        self.start_time = Some(Utc::now());
        log::info!("Task '{}' started by '{}'", self.display_name(), agent.role);

        let raw = agent.execute_task(&self.prompt(), context).await?;

        let json_dict = if self.output_json {
            match BaseLLMState::validate_structured_output(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    log::warn!("Task '{}' output is not valid JSON: {}", self.display_name(), e);
                    None
                }
            }
        } else {
            None
        };

        self.end_time = Some(Utc::now());
        let task_output = TaskOutput {
            description: self.description.clone(),
            name: self.name.clone(),
            expected_output: Some(self.expected_output.clone()),
            summary: Some(summary_of(&self.description)),
            raw,
            json_dict,
            agent: agent.role.clone(),
            output_format: self.get_output_format(),
            messages: agent.last_messages.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
        };

        if self.output_file.is_some() {
            let content = match &task_output.json_dict {
                Some(value) => serde_json::to_string_pretty(value)
                    .unwrap_or_else(|_| task_output.raw.clone()),
                None => task_output.raw.clone(),
            };
            self.save_file(&content)?;
        }

        self.output = Some(task_output.clone());

        if let Some(cb) = &self.callback {
            cb(&task_output);
        }

        log::info!(
            "Task '{}' completed in {:.2}s",
            self.display_name(),
            self.execution_duration().unwrap_or_default()
        );
        Ok(task_output)
    }

    fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| summary_of(&self.description))
    }

    /// MD5 of `description|expected_output`, computed from the
    /// uninterpolated text.
    pub fn key(&self) -> String {
        let desc = self
            .original_description
            .as_deref()
            .unwrap_or(&self.description);
        let expected = self
            .original_expected_output
            .as_deref()
            .unwrap_or(&self.expected_output);

        let source = format!("{}|{}", desc, expected);
        let mut hasher = Md5::new();
        hasher.update(source.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Get the execution duration in seconds, if both start and end times are set.
    pub fn execution_duration(&self) -> Option<f64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
            _ => None,
        }
    }

    /// Interpolate inputs into the task description, expected output, and output file path.
    pub fn interpolate_inputs(&mut self, inputs: &HashMap<String, String>) {
        let description = self
            .original_description
            .get_or_insert_with(|| self.description.clone());
        let expected = self
            .original_expected_output
            .get_or_insert_with(|| self.expected_output.clone());
        if self.original_output_file.is_none() {
            self.original_output_file = self.output_file.clone();
        }

        if inputs.is_empty() {
            return;
        }

        self.description = interpolate_string(description, inputs);
        self.expected_output = interpolate_string(expected, inputs);
        if let Some(orig_file) = &self.original_output_file {
            self.output_file = Some(interpolate_string(orig_file, inputs));
        }
    }

    fn get_output_format(&self) -> OutputFormat {
        if self.output_json {
            OutputFormat::JSON
        } else {
            OutputFormat::Raw
        }
    }

    /// Save task output to a file.
    pub fn save_file(&self, result: &str) -> Result<(), CrewError> {
        let Some(output_file) = &self.output_file else {
            return Ok(());
        };
        let to_error = |source| CrewError::OutputFile {
            path: output_file.clone(),
            source,
        };

        let path = Path::new(output_file);
        if self.create_directory {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(to_error)?;
            }
        }

        std::fs::write(path, result).map_err(to_error)?;
        log::debug!("Saved task output to {}", output_file);
        Ok(())
    }
}

fn summary_of(description: &str) -> String {
    let excerpt = description
        .split_whitespace()
        .take(10)
        .collect::<Vec<&str>>()
        .join(" ");
    format!("{}...", excerpt)
}
