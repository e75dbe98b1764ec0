//! Agent output parsing for ReAct-style LLM responses.
//!
//! Converts model text into an `AgentAction` (use a tool) or an
//! `AgentFinish` (final answer). Malformed text yields an
//! `OutputParserError` whose message is fed back to the model.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The text prefix for a final answer.
pub const FINAL_ANSWER_ACTION: &str = "Final Answer:";

const MISSING_ACTION_AFTER_THOUGHT_ERROR_MESSAGE: &str =
    "I just got this: I couldn't find an Action after the Thought.";

const MISSING_ACTION_INPUT_AFTER_ACTION_ERROR_MESSAGE: &str =
    "I just got this: I found an Action but couldn't find a valid Action Input right after it.";

static ACTION_INPUT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)Action\s*\d*\s*:\s*(.+?)\s*(?:\n|\r\n?)Action\s*\d*\s*Input\s*\d*\s*:\s*(.*)")
        .expect("valid action regex")
});
static ACTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Action\s*\d*\s*:").expect("valid action regex"));
static ACTION_INPUT_ONLY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Action\s*\d*\s*Input\s*\d*\s*:").expect("valid action input regex"));

/// An action to be taken by an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentAction {
    /// The agent's reasoning before taking the action.
    pub thought: String,
    /// The name of the tool to use.
    pub tool: String,
    /// The raw input to pass to the tool.
    pub tool_input: String,
    /// The text that was parsed.
    pub text: String,
    /// The observation from executing the tool, once known.
    pub result: Option<String>,
}

/// The final answer from an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentFinish {
    pub thought: String,
    pub output: String,
    pub text: String,
}

/// Raised when output parsing fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputParserError {
    /// The message describing what went wrong, phrased for the model.
    pub error: String,
}

impl OutputParserError {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

impl fmt::Display for OutputParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OutputParserError: {}", self.error)
    }
}

impl std::error::Error for OutputParserError {}

/// Result of parsing agent output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult {
    /// The agent wants to use a tool.
    Action(AgentAction),
    /// The agent has a final answer.
    Finish(AgentFinish),
}

/// Parse agent output text into `AgentAction` or `AgentFinish`.
///
/// **Action format**:
/// ```text
/// Thought: agent thought here
/// Action: list_pdf_files
/// Action Input: {"directory": "./receipt_pdfs"}
/// ```
///
/// **Final answer format**:
/// ```text
/// Thought: agent thought here
/// Final Answer: [{"company_name": "Cafe", "total_amount": "4.50"}]
/// ```
///
/// A final answer wins when both markers are present.
pub fn parse(text: &str) -> Result<ParseResult, OutputParserError> {
    let thought = extract_thought(text);

    if let Some(idx) = text.rfind(FINAL_ANSWER_ACTION) {
        let final_answer = text[idx + FINAL_ANSWER_ACTION.len()..].trim();
        return Ok(ParseResult::Finish(AgentFinish {
            thought,
            output: clean_trailing_backticks(final_answer),
            text: text.to_string(),
        }));
    }

    if let Some(caps) = ACTION_INPUT_RE.captures(text) {
        let action = caps.get(1).map_or("", |m| m.as_str());
        let action_input = caps.get(2).map_or("", |m| m.as_str());
        let tool_input = clean_action_input(action_input);

        return Ok(ParseResult::Action(AgentAction {
            thought,
            tool: clean_action(action),
            tool_input: safe_repair_json(&tool_input),
            text: text.to_string(),
            result: None,
        }));
    }

    if !ACTION_RE.is_match(text) {
        return Err(OutputParserError::new(format!(
            "{}\nYou MUST use the following format:\n\
             Thought: [your thought]\n\
             Final Answer: [your final answer]",
            MISSING_ACTION_AFTER_THOUGHT_ERROR_MESSAGE
        )));
    }

    if !ACTION_INPUT_ONLY_RE.is_match(text) {
        return Err(OutputParserError::new(
            MISSING_ACTION_INPUT_AFTER_ACTION_ERROR_MESSAGE,
        ));
    }

    Err(OutputParserError::new(
        "Could not parse the output. Please use the correct format.",
    ))
}

fn extract_thought(text: &str) -> String {
    let thought_index = text.find("\nAction").or_else(|| text.find("\nFinal Answer"));
    match thought_index {
        Some(idx) => text[..idx].replace("```", "").trim().to_string(),
        None => String::new(),
    }
}

fn clean_action(text: &str) -> String {
    text.trim().trim_matches('*').trim().to_string()
}

fn clean_action_input(text: &str) -> String {
    let trimmed = text.trim();
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed).trim_end();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed)
        .trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        trimmed.to_string()
    } else {
        trimmed.trim_matches('"').to_string()
    }
}

/// Drop an unmatched trailing triple backtick.
fn clean_trailing_backticks(text: &str) -> String {
    if text.ends_with("```") && text.matches("```").count() % 2 != 0 {
        return text[..text.len() - 3].trim_end().to_string();
    }
    text.to_string()
}

/// Repair common model mistakes in JSON input.
///
/// Arrays are left alone; triple quotes are collapsed only when that
/// produces valid JSON.
fn safe_repair_json(tool_input: &str) -> String {
    if tool_input.starts_with('[') && tool_input.ends_with(']') {
        return tool_input.to_string();
    }

    let cleaned = tool_input.replace("\"\"\"", "\"");
    if serde_json::from_str::<Value>(&cleaned).is_ok() {
        return cleaned;
    }

    tool_input.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_final_answer() {
        let text = "Thought: I know the answer\nFinal Answer: The total is 42.10";
        match parse(text).unwrap() {
            ParseResult::Finish(finish) => {
                assert_eq!(finish.output, "The total is 42.10");
                assert_eq!(finish.thought, "Thought: I know the answer");
            }
            other => panic!("expected AgentFinish, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_action_with_json_input() {
        let text = "Thought: list first\nAction: list_pdf_files\nAction Input: {\"directory\": \"./receipt_pdfs\"}";
        match parse(text).unwrap() {
            ParseResult::Action(action) => {
                assert_eq!(action.tool, "list_pdf_files");
                assert_eq!(action.tool_input, "{\"directory\": \"./receipt_pdfs\"}");
                assert_eq!(action.thought, "Thought: list first");
            }
            other => panic!("expected AgentAction, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_action_strips_markdown_and_quotes() {
        let text = "Action: **read_json_file**\nAction Input: \"extracted_receipts.json\"";
        match parse(text).unwrap() {
            ParseResult::Action(action) => {
                assert_eq!(action.tool, "read_json_file");
                assert_eq!(action.tool_input, "extracted_receipts.json");
            }
            other => panic!("expected AgentAction, got {:?}", other),
        }
    }

    #[test]
    fn test_final_answer_wins_over_action() {
        let text = "Action: save_json_data\nAction Input: {}\nFinal Answer: done";
        assert!(matches!(parse(text).unwrap(), ParseResult::Finish(f) if f.output == "done"));
    }

    #[test]
    fn test_final_answer_unmatched_backticks() {
        let text = "Final Answer: {\"a\": 1}\n```";
        match parse(text).unwrap() {
            ParseResult::Finish(finish) => assert_eq!(finish.output, "{\"a\": 1}"),
            other => panic!("expected AgentFinish, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_missing_action() {
        let err = parse("Thought: I need to do something").unwrap_err();
        assert!(err.error.contains("couldn't find an Action"));
    }

    #[test]
    fn test_parse_missing_action_input() {
        let err = parse("Thought: hmm\nAction: list_pdf_files").unwrap_err();
        assert!(err.error.contains("couldn't find a valid Action Input"));
    }

    #[test]
    fn test_safe_repair_json_triple_quotes() {
        assert_eq!(safe_repair_json("{\"\"\"a\"\"\": 1}"), "{\"a\": 1}");
        assert_eq!(safe_repair_json("[1, 2]"), "[1, 2]");
        assert_eq!(safe_repair_json("not json"), "not json");
    }
}
