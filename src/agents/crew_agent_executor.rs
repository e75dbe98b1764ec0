//! Agent executor for crew agents.
//!
//! Drives the ReAct loop: call the LLM, parse the answer, run the requested
//! tool, feed the observation back, and stop at a final answer. After
//! `max_iter` iterations the model is asked once for its best final answer.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::parser::{self, AgentAction, AgentFinish, ParseResult};
use super::tools_handler::{ToolCalling, ToolsHandler};
use crate::llms::base_llm::{BaseLLM, LLMMessage};
use crate::tools::base_tool::{render_tool_description, result_to_observation, BaseTool};
use crate::tools::structured_tool::CrewStructuredTool;
use crate::utilities::errors::{CrewError, ToolError};
use crate::utilities::logger::Logger;
use crate::utilities::prompts::{self, AgentInfo, Prompts};

/// Marker the model writes before a tool result; everything after it is
/// hallucinated and dropped.
pub const OBSERVATION_MARKER: &str = "\nObservation:";

/// Callback invoked after every parsed step.
pub type StepCallback = Arc<dyn Fn(&ParseResult) + Send + Sync>;

/// Executor for a single agent working on a single task.
pub struct CrewAgentExecutor {
    pub llm: Arc<dyn BaseLLM>,
    pub agent: AgentInfo,
    /// Available structured tools.
    pub tools: Vec<CrewStructuredTool>,
    /// Comma-separated tool names.
    pub tools_names: String,
    prompts: Prompts,
    /// Maximum iterations before forcing a final answer.
    pub max_iter: u32,
    pub tools_handler: ToolsHandler,
    pub step_callback: Option<StepCallback>,
    logger: Logger,
    /// Conversation message history.
    pub messages: Vec<LLMMessage>,
    /// Current iteration count.
    pub iterations: u32,
}

impl fmt::Debug for CrewAgentExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrewAgentExecutor")
            .field("role", &self.agent.role)
            .field("model", &self.llm.model())
            .field("tools_names", &self.tools_names)
            .field("max_iter", &self.max_iter)
            .field("iterations", &self.iterations)
            .field("messages_count", &self.messages.len())
            .finish()
    }
}

impl CrewAgentExecutor {
    pub fn new(
        llm: Arc<dyn BaseLLM>,
        agent: AgentInfo,
        tools: Vec<CrewStructuredTool>,
        max_iter: u32,
        tools_handler: ToolsHandler,
        logger: Logger,
    ) -> Self {
        let tool_names: Vec<String> = tools.iter().map(|t| t.name.clone()).collect();
        let descriptions: Vec<String> = tools
            .iter()
            .map(|t| render_tool_description(t as &dyn BaseTool))
            .collect();
        Self {
            llm,
            agent,
            tools_names: tool_names.join(", "),
            prompts: Prompts::new(descriptions, tool_names),
            tools,
            max_iter,
            tools_handler,
            step_callback: None,
            logger,
            messages: Vec::new(),
            iterations: 0,
        }
    }

    pub fn with_step_callback(mut self, callback: Option<StepCallback>) -> Self {
        self.step_callback = callback;
        self
    }

    /// Run the agent on `input` until it produces a final answer.
    pub async fn invoke(&mut self, input: &str) -> Result<AgentFinish, CrewError> {
        self.setup_messages(input);
        self.iterations = 0;

        loop {
            if self.iterations >= self.max_iter {
                return self.force_final_answer().await;
            }
            self.iterations += 1;

            let answer = self.call_llm().await?;
            self.append_message(LLMMessage::assistant(answer.clone()));

            match parser::parse(&answer) {
                Ok(ParseResult::Finish(finish)) => {
                    self.invoke_step_callback(&ParseResult::Finish(finish.clone()));
                    self.logger.final_answer(&self.agent.role, &finish.output);
                    return Ok(finish);
                }
                Ok(ParseResult::Action(mut action)) => {
                    let (observation, as_answer) = self.execute_tool(&action);
                    action.result = Some(observation.clone());
                    self.invoke_step_callback(&ParseResult::Action(action.clone()));

                    if as_answer {
                        let finish = AgentFinish {
                            thought: action.thought,
                            output: observation,
                            text: action.text,
                        };
                        self.logger.final_answer(&self.agent.role, &finish.output);
                        return Ok(finish);
                    }
                    self.append_message(LLMMessage::user(format!("Observation: {}", observation)));
                }
                Err(e) => {
                    log::debug!(
                        "Agent '{}' produced unparseable output on iteration {}: {}",
                        self.agent.role,
                        self.iterations,
                        e
                    );
                    self.append_message(LLMMessage::user(e.error));
                }
            }
        }
    }

    fn setup_messages(&mut self, input: &str) {
        let prompt = self.prompts.task_execution(&self.agent, input);
        self.messages = vec![LLMMessage::system(prompt.system), LLMMessage::user(prompt.user)];
    }

    async fn call_llm(&self) -> Result<String, CrewError> {
        let response = self.llm.acall(&self.messages).await?;
        Ok(truncate_at_observation(&response))
    }

    /// Ask once for the best final answer; accept the raw text when the
    /// marker is still missing.
    async fn force_final_answer(&mut self) -> Result<AgentFinish, CrewError> {
        log::warn!(
            "Agent '{}' reached max iterations ({}), forcing a final answer",
            self.agent.role,
            self.max_iter
        );
        self.append_message(LLMMessage::user(prompts::FORCE_FINAL_ANSWER));
        let answer = self.call_llm().await?;
        self.append_message(LLMMessage::assistant(answer.clone()));

        let finish = match parser::parse(&answer) {
            Ok(ParseResult::Finish(finish)) => finish,
            _ => AgentFinish {
                thought: String::new(),
                output: answer.trim().to_string(),
                text: answer,
            },
        };
        self.invoke_step_callback(&ParseResult::Finish(finish.clone()));
        self.logger.final_answer(&self.agent.role, &finish.output);
        Ok(finish)
    }

    /// Run the tool an action names and return `(observation, result_as_answer)`.
    fn execute_tool(&mut self, action: &AgentAction) -> (String, bool) {
        let wanted = action.tool.trim().to_lowercase();
        let Some(idx) = self
            .tools
            .iter()
            .position(|t| t.name.to_lowercase() == wanted)
        else {
            let observation = prompts::tool_not_found(&action.tool, &self.tools_names);
            self.logger
                .tool_used(&self.agent.role, &action.tool, &action.tool_input, &observation);
            return (observation, false);
        };

        let tool = &mut self.tools[idx];
        let calling = ToolCalling::new(tool.name.clone(), action.tool_input.clone());
        let as_answer = tool.result_as_answer;
        let cacheable = tool.cache;

        if let Some(cached) = cacheable
            .then(|| self.tools_handler.cached(&calling))
            .flatten()
        {
            log::debug!("Cache hit for tool '{}'", calling.tool_name);
            self.logger
                .tool_used(&self.agent.role, &calling.tool_name, &calling.tool_input, &cached);
            return (cached, as_answer);
        }

        let (observation, succeeded) =
            match tool.invoke(Value::String(action.tool_input.clone())) {
                Ok(result) => (result_to_observation(&result), true),
                Err(ToolError::Execution(message)) => (message, false),
                Err(e) => (prompts::tool_usage_error(&e.to_string()), false),
            };

        self.tools_handler
            .on_tool_use(&calling, &observation, succeeded && cacheable);
        self.logger
            .tool_used(&self.agent.role, &calling.tool_name, &calling.tool_input, &observation);
        (observation, as_answer && succeeded)
    }

    fn append_message(&mut self, message: LLMMessage) {
        self.messages.push(message);
    }

    fn invoke_step_callback(&self, step: &ParseResult) {
        if let Some(callback) = &self.step_callback {
            callback(step);
        }
    }
}

/// Cut a model response at the first `\nObservation:` marker.
pub fn truncate_at_observation(text: &str) -> String {
    match text.find(OBSERVATION_MARKER) {
        Some(idx) => text[..idx].trim_end().to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::cache::CacheHandler;
    use crate::llms::testing::ScriptedLLM;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn agent_info() -> AgentInfo {
        AgentInfo {
            role: "Receipt Data Extractor".to_string(),
            goal: "Extract totals".to_string(),
            backstory: "Reads receipts.".to_string(),
        }
    }

    fn counting_tool(counter: Arc<AtomicUsize>) -> CrewStructuredTool {
        CrewStructuredTool::new(
            "list_pdf_files",
            "List all PDF files in a directory",
            json!({
                "type": "object",
                "properties": { "directory": { "type": "string" } },
                "required": ["directory"]
            }),
            Arc::new(move |_args: HashMap<String, Value>| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<Value, ToolError>(json!(["a.pdf", "b.pdf"]))
            }),
        )
    }

    fn failing_tool() -> CrewStructuredTool {
        CrewStructuredTool::new(
            "extract_text_from_pdf",
            "Extract text from a PDF file",
            json!({
                "type": "object",
                "properties": { "pdf_path": { "type": "string" } },
                "required": ["pdf_path"]
            }),
            Arc::new(|_args: HashMap<String, Value>| {
                Err::<Value, ToolError>(ToolError::Execution(
                    "Error reading PDF: missing.pdf not found".to_string(),
                ))
            }),
        )
    }

    fn executor(llm: Arc<ScriptedLLM>, tools: Vec<CrewStructuredTool>, max_iter: u32) -> CrewAgentExecutor {
        CrewAgentExecutor::new(
            llm,
            agent_info(),
            tools,
            max_iter,
            ToolsHandler::new(Some(CacheHandler::new())),
            Logger::new(false),
        )
    }

    #[tokio::test]
    async fn test_direct_final_answer() {
        let llm = Arc::new(ScriptedLLM::new(["Thought: easy\nFinal Answer: 42"]));
        let mut exec = executor(llm.clone(), vec![], 5);

        let finish = exec.invoke("What is the answer?").await.unwrap();
        assert_eq!(finish.output, "42");
        assert_eq!(exec.iterations, 1);
        assert_eq!(exec.messages.len(), 3);
        assert_eq!(exec.messages[0].role, "system");
        assert!(exec.messages[1].content.contains("Current Task: What is the answer?"));
    }

    #[tokio::test]
    async fn test_action_then_final_answer() {
        let counter = Arc::new(AtomicUsize::new(0));
        let llm = Arc::new(ScriptedLLM::new([
            "Thought: list\nAction: list_pdf_files\nAction Input: {\"directory\": \"r\"}\nObservation: hallucinated",
            "Thought: done\nFinal Answer: two files",
        ]));
        let mut exec = executor(llm.clone(), vec![counting_tool(counter.clone())], 5);

        let finish = exec.invoke("List receipts").await.unwrap();
        assert_eq!(finish.output, "two files");
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let assistant = &exec.messages[2];
        assert_eq!(assistant.role, "assistant");
        assert!(!assistant.content.contains("hallucinated"));

        let observation = &exec.messages[3];
        assert_eq!(observation.role, "user");
        assert!(observation.content.starts_with("Observation: [\n  \"a.pdf\""));
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_repeated_tool_call_uses_cache() {
        let counter = Arc::new(AtomicUsize::new(0));
        let action = "Action: list_pdf_files\nAction Input: {\"directory\": \"r\"}";
        let llm = Arc::new(ScriptedLLM::new([action, action, "Final Answer: ok"]));
        let mut exec = executor(llm, vec![counting_tool(counter.clone())], 5);

        exec.invoke("List receipts").await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_lists_available() {
        let counter = Arc::new(AtomicUsize::new(0));
        let llm = Arc::new(ScriptedLLM::new([
            "Action: fly_to_moon\nAction Input: {}",
            "Final Answer: gave up",
        ]));
        let mut exec = executor(llm, vec![counting_tool(counter)], 5);

        exec.invoke("Go").await.unwrap();
        let observation = &exec.messages[3].content;
        assert!(observation.contains("Action 'fly_to_moon' don't exist"));
        assert!(observation.contains("list_pdf_files"));
    }

    #[tokio::test]
    async fn test_tool_error_becomes_observation() {
        let llm = Arc::new(ScriptedLLM::new([
            "Action: extract_text_from_pdf\nAction Input: {\"pdf_path\": \"missing.pdf\"}",
            "Final Answer: []",
        ]));
        let mut exec = executor(llm, vec![failing_tool()], 5);

        let finish = exec.invoke("Extract").await.unwrap();
        assert_eq!(finish.output, "[]");
        assert_eq!(
            exec.messages[3].content,
            "Observation: Error reading PDF: missing.pdf not found"
        );
    }

    #[tokio::test]
    async fn test_parse_error_is_fed_back() {
        let llm = Arc::new(ScriptedLLM::new(["I am just rambling", "Final Answer: fine"]));
        let mut exec = executor(llm, vec![], 5);

        exec.invoke("Go").await.unwrap();
        assert!(exec.messages[3].content.contains("couldn't find an Action"));
    }

    #[tokio::test]
    async fn test_max_iter_forces_final_answer() {
        let counter = Arc::new(AtomicUsize::new(0));
        let llm = Arc::new(ScriptedLLM::new([
            "Action: list_pdf_files\nAction Input: {\"directory\": \"a\"}",
            "Action: list_pdf_files\nAction Input: {\"directory\": \"b\"}",
            "My best answer without the marker",
        ]));
        let mut exec = executor(llm.clone(), vec![counting_tool(counter)], 2);

        let finish = exec.invoke("Go").await.unwrap();
        assert_eq!(finish.output, "My best answer without the marker");
        assert_eq!(llm.call_count(), 3);

        let calls = llm.calls.lock();
        let last_prompt = calls.last().unwrap().last().unwrap();
        assert_eq!(last_prompt.content, prompts::FORCE_FINAL_ANSWER);
    }

    #[tokio::test]
    async fn test_llm_error_aborts() {
        let llm = Arc::new(ScriptedLLM::new(Vec::<String>::new()).then_fail("quota"));
        let mut exec = executor(llm, vec![], 5);

        let err = exec.invoke("Go").await.unwrap_err();
        assert!(matches!(err, CrewError::Llm(_)));
    }

    #[tokio::test]
    async fn test_result_as_answer_and_step_callback() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut tool = counting_tool(counter);
        tool.result_as_answer = true;
        let llm = Arc::new(ScriptedLLM::new([
            "Action: list_pdf_files\nAction Input: {\"directory\": \"r\"}",
        ]));
        let steps: Arc<Mutex<Vec<ParseResult>>> = Arc::new(Mutex::new(Vec::new()));
        let recorded = steps.clone();
        let mut exec = executor(llm, vec![tool], 5)
            .with_step_callback(Some(Arc::new(move |step: &ParseResult| recorded.lock().push(step.clone()))));

        let finish = exec.invoke("Go").await.unwrap();
        assert!(finish.output.contains("b.pdf"));

        let steps = steps.lock();
        assert_eq!(steps.len(), 1);
        match &steps[0] {
            ParseResult::Action(action) => assert!(action.result.is_some()),
            other => panic!("expected action step, got {:?}", other),
        }
    }

    #[test]
    fn test_truncate_at_observation() {
        assert_eq!(
            truncate_at_observation("Action: x\nAction Input: {}\nObservation: fake"),
            "Action: x\nAction Input: {}"
        );
        assert_eq!(truncate_at_observation("Final Answer: 1"), "Final Answer: 1");
    }
}
