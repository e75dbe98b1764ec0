//! Base tool definitions.
//!
//! Provides the `BaseTool` trait agents execute tools through, the shared
//! tool function type, and the prompt rendering of a tool's signature.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::utilities::errors::ToolError;

/// Type alias for a shared synchronous tool function.
pub type ToolFn = Arc<dyn Fn(HashMap<String, Value>) -> Result<Value, ToolError> + Send + Sync>;

/// Base trait for all tools an agent can call.
///
/// Implementors provide `name`, `description`, usage accounting and `run`.
pub trait BaseTool: Send + Sync + fmt::Debug {
    /// The unique name of the tool that clearly communicates its purpose.
    fn name(&self) -> &str;

    /// Description used to tell the model how/when/why to use the tool.
    fn description(&self) -> &str;

    /// JSON schema for the arguments that the tool accepts.
    fn args_schema(&self) -> Value {
        Value::Object(serde_json::Map::new())
    }

    /// Whether the tool result should be the final agent answer.
    fn result_as_answer(&self) -> bool {
        false
    }

    /// Maximum number of times this tool can be used. `None` means unlimited.
    fn max_usage_count(&self) -> Option<u32> {
        None
    }

    fn current_usage_count(&self) -> u32;

    fn reset_usage_count(&mut self);

    fn has_reached_max_usage_count(&self) -> bool {
        match self.max_usage_count() {
            Some(max) => self.current_usage_count() >= max,
            None => false,
        }
    }

    /// Execute the tool with parsed arguments.
    fn run(&mut self, args: HashMap<String, Value>) -> Result<Value, ToolError>;
}

/// Render a tool for the agent system prompt.
///
/// Produces the `Tool Name` / `Tool Arguments` / `Tool Description` block
/// the ReAct prompt lists for each available tool.
pub fn render_tool_description(tool: &dyn BaseTool) -> String {
    let args: serde_json::Map<String, Value> = tool
        .args_schema()
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    format!(
        "Tool Name: {}\nTool Arguments: {}\nTool Description: {}",
        tool.name(),
        Value::Object(args),
        tool.description()
    )
}

/// Observation text for a tool result.
pub fn result_to_observation(result: &Value) -> String {
    match result {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_to_observation() {
        assert_eq!(result_to_observation(&json!("done")), "done");
        assert_eq!(result_to_observation(&json!(["a.pdf"])), "[\n  \"a.pdf\"\n]");
    }
}
