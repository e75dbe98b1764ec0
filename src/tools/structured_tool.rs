//! Structured tool implementation.
//!
//! `CrewStructuredTool` pairs a JSON argument schema with a tool function,
//! parses the free-form `Action Input` an agent writes, and enforces usage
//! limits.

use std::collections::HashMap;
use std::fmt;

use serde_json::{json, Value};

use super::base_tool::{BaseTool, ToolFn};
use crate::utilities::errors::ToolError;

/// A structured tool that can operate on any number of inputs.
#[derive(Clone)]
pub struct CrewStructuredTool {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's arguments.
    pub args_schema: Value,
    pub func: ToolFn,
    /// Whether to return the output directly as the agent's final answer.
    pub result_as_answer: bool,
    /// Maximum number of times this tool can be used. `None` means unlimited.
    pub max_usage_count: Option<u32>,
    pub current_usage_count: u32,
    /// Whether successful results may be served from the tool cache.
    pub cache: bool,
}

impl fmt::Debug for CrewStructuredTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrewStructuredTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("result_as_answer", &self.result_as_answer)
            .field("max_usage_count", &self.max_usage_count)
            .field("current_usage_count", &self.current_usage_count)
            .field("cache", &self.cache)
            .finish()
    }
}

impl fmt::Display for CrewStructuredTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CrewStructuredTool(name='{}', description='{}')",
            self.name, self.description
        )
    }
}

impl CrewStructuredTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        args_schema: Value,
        func: ToolFn,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            args_schema,
            func,
            result_as_answer: false,
            max_usage_count: None,
            current_usage_count: 0,
            cache: true,
        }
    }

    /// Tools with side effects must not be answered from the cache.
    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// Builder method to set the maximum usage count.
    pub fn with_max_usage_count(mut self, max_usage_count: u32) -> Self {
        self.max_usage_count = Some(max_usage_count);
        self
    }

    /// Names of the schema's required properties, in schema order.
    pub fn required_args(&self) -> Vec<String> {
        self.args_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| n.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Parse the agent-supplied input into named arguments.
    ///
    /// Accepts a JSON object, a JSON string holding an object, or (for tools
    /// with exactly one required argument) a bare value that is bound to
    /// that argument. Missing required arguments are rejected.
    pub fn parse_args(&self, raw_args: Value) -> Result<HashMap<String, Value>, ToolError> {
        let obj = match raw_args {
            Value::Object(map) => map,
            Value::String(s) => match serde_json::from_str::<Value>(s.trim()) {
                Ok(Value::Object(map)) => map,
                _ => self.bind_single_argument(Value::String(s))?,
            },
            Value::Null => serde_json::Map::new(),
            other => self.bind_single_argument(other)?,
        };

        for required in self.required_args() {
            if !obj.contains_key(&required) {
                return Err(ToolError::InvalidArguments {
                    tool: self.name.clone(),
                    message: format!("missing required argument '{}'", required),
                });
            }
        }

        Ok(obj.into_iter().collect())
    }

    fn bind_single_argument(&self, value: Value) -> Result<serde_json::Map<String, Value>, ToolError> {
        let required = self.required_args();
        match required.as_slice() {
            [only] => {
                let value = match value {
                    Value::String(s) => Value::String(s.trim().trim_matches('"').to_string()),
                    other => other,
                };
                Ok([(only.clone(), value)].into_iter().collect())
            }
            _ => Err(ToolError::InvalidArguments {
                tool: self.name.clone(),
                message: format!(
                    "arguments must be a JSON object matching {}",
                    self.args_schema.get("properties").unwrap_or(&json!({}))
                ),
            }),
        }
    }

    /// Parse arguments, check the usage limit and run the tool.
    pub fn invoke(&mut self, input: Value) -> Result<Value, ToolError> {
        let parsed_args = self.parse_args(input)?;
        self.run(parsed_args)
    }
}

impl BaseTool for CrewStructuredTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn args_schema(&self) -> Value {
        self.args_schema.clone()
    }

    fn result_as_answer(&self) -> bool {
        self.result_as_answer
    }

    fn max_usage_count(&self) -> Option<u32> {
        self.max_usage_count
    }

    fn current_usage_count(&self) -> u32 {
        self.current_usage_count
    }

    fn reset_usage_count(&mut self) {
        self.current_usage_count = 0;
    }

    fn run(&mut self, args: HashMap<String, Value>) -> Result<Value, ToolError> {
        if self.has_reached_max_usage_count() {
            return Err(ToolError::UsageLimitExceeded {
                tool: self.name.clone(),
                limit: self.max_usage_count.unwrap_or(0),
            });
        }
        self.current_usage_count += 1;
        (self.func)(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::base_tool::render_tool_description;
    use std::sync::Arc;

    fn echo_tool() -> CrewStructuredTool {
        CrewStructuredTool::new(
            "echo",
            "Echo the path back",
            json!({
                "type": "object",
                "properties": { "path": { "type": "string" } },
                "required": ["path"]
            }),
            Arc::new(|args: HashMap<String, Value>| {
                Ok::<Value, ToolError>(args["path"].clone())
            }),
        )
    }

    #[test]
    fn test_parse_args_json_string() {
        let tool = echo_tool();
        let args = tool.parse_args(json!(r#"{"path": "a.pdf"}"#)).unwrap();
        assert_eq!(args["path"], "a.pdf");
    }

    #[test]
    fn test_parse_args_binds_bare_value_to_single_argument() {
        let tool = echo_tool();
        let args = tool.parse_args(json!("\"receipts/a.pdf\"")).unwrap();
        assert_eq!(args["path"], "receipts/a.pdf");
    }

    #[test]
    fn test_parse_args_missing_required() {
        let tool = echo_tool();
        let err = tool.parse_args(json!({"other": 1})).unwrap_err();
        assert!(err.to_string().contains("missing required argument 'path'"));
    }

    #[test]
    fn test_invoke_enforces_usage_limit() {
        let mut tool = echo_tool().with_max_usage_count(1);
        assert_eq!(tool.invoke(json!({"path": "x"})).unwrap(), json!("x"));
        let err = tool.invoke(json!({"path": "y"})).unwrap_err();
        assert!(matches!(err, ToolError::UsageLimitExceeded { limit: 1, .. }));

        tool.reset_usage_count();
        assert!(tool.invoke(json!({"path": "z"})).is_ok());
    }

    #[test]
    fn test_render_tool_description() {
        let rendered = render_tool_description(&echo_tool());
        assert_eq!(
            rendered,
            "Tool Name: echo\nTool Arguments: {\"path\":{\"type\":\"string\"}}\nTool Description: Echo the path back"
        );
    }
}
