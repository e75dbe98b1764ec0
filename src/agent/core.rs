//! Core Agent struct.
//!
//! An agent is a role, a goal and a backstory bound to an LLM and a set of
//! tools. `execute_task` builds a fresh `CrewAgentExecutor` for each task so
//! tool usage counters start from zero, while the tool cache is shared for
//! the agent's lifetime.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use md5::{Digest, Md5};
use uuid::Uuid;

use crate::agents::cache::CacheHandler;
use crate::agents::crew_agent_executor::{CrewAgentExecutor, StepCallback};
use crate::agents::tools_handler::ToolsHandler;
use crate::llms::base_llm::{BaseLLM, LLMMessage};
use crate::tools::structured_tool::CrewStructuredTool;
use crate::utilities::errors::CrewError;
use crate::utilities::logger::Logger;
use crate::utilities::prompts::{self, AgentInfo};

/// Default maximum iterations for an agent to execute a task.
pub const DEFAULT_MAX_ITER: u32 = 25;

/// Represents an agent in a crew.
///
/// Each agent has a role, a goal, a backstory and a language model. The
/// agent can operate in verbose mode and caches tool results by default.
#[derive(Clone)]
pub struct Agent {
    /// Unique identifier for the agent.
    pub id: Uuid,
    /// Role of the agent.
    pub role: String,
    /// Objective of the agent.
    pub goal: String,
    /// Backstory of the agent.
    pub backstory: String,
    /// Language model that will run the agent.
    pub llm: Arc<dyn BaseLLM>,
    /// Tools at the agent's disposal.
    pub tools: Vec<CrewStructuredTool>,
    /// Maximum iterations for an agent to execute a task.
    pub max_iter: u32,
    /// Verbose mode for the agent execution.
    pub verbose: bool,
    /// Recorded for configuration parity; agents never delegate.
    pub allow_delegation: bool,
    /// Whether the agent should use a cache for tool usage.
    pub cache: bool,
    /// Callback to be executed after each step of the agent execution.
    pub step_callback: Option<StepCallback>,
    /// Messages exchanged during the most recent execution.
    pub last_messages: Vec<LLMMessage>,
    cache_handler: CacheHandler,
    original_role: Option<String>,
    original_goal: Option<String>,
    original_backstory: Option<String>,
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("goal", &self.goal)
            .field("model", &self.llm.model())
            .field("tools", &self.tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>())
            .field("max_iter", &self.max_iter)
            .field("verbose", &self.verbose)
            .field("cache", &self.cache)
            .finish()
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Agent(role={}, goal={}, backstory={})",
            self.role, self.goal, self.backstory
        )
    }
}

impl Agent {
    pub fn new(
        role: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
        llm: Arc<dyn BaseLLM>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: role.into(),
            goal: goal.into(),
            backstory: backstory.into(),
            llm,
            tools: Vec::new(),
            max_iter: DEFAULT_MAX_ITER,
            verbose: false,
            allow_delegation: false,
            cache: true,
            step_callback: None,
            last_messages: Vec::new(),
            cache_handler: CacheHandler::new(),
            original_role: None,
            original_goal: None,
            original_backstory: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<CrewStructuredTool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_max_iter(mut self, max_iter: u32) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_step_callback(mut self, callback: StepCallback) -> Self {
        self.step_callback = Some(callback);
        self
    }

    /// Replace the tool cache. A crew hands every agent its own per-kickoff cache.
    pub fn set_cache_handler(&mut self, cache_handler: CacheHandler) {
        self.cache_handler = cache_handler;
    }

    pub fn cache_handler(&self) -> &CacheHandler {
        &self.cache_handler
    }

    /// Execute a task with the agent.
    ///
    /// `context` holds the output of earlier tasks and is appended under a
    /// `Context:` heading. Returns the final answer text.
    pub async fn execute_task(
        &mut self,
        task_prompt: &str,
        context: Option<&str>,
    ) -> Result<String, CrewError> {
        log::debug!("Agent '{}' executing task: {}", self.role, task_prompt);

        let task_prompt = match context {
            Some(ctx) if !ctx.trim().is_empty() => prompts::task_with_context(task_prompt, ctx),
            _ => task_prompt.to_string(),
        };

        let logger = Logger::new(self.verbose);
        logger.agent_started(&self.role, &task_prompt);

        let mut executor = self.create_agent_executor(logger);
        let result = executor.invoke(&task_prompt).await;
        self.last_messages = executor.messages;

        let finish = result?;
        log::debug!(
            "Agent '{}' finished after {} iteration(s)",
            self.role,
            executor.iterations
        );
        Ok(finish.output)
    }

    /// Run the agent on a standalone query without a crew.
    pub async fn kickoff(&mut self, query: &str) -> Result<String, CrewError> {
        log::debug!("Agent '{}' kickoff with query: {}", self.role, query);
        self.execute_task(query, None).await
    }

    /// Build an executor for one task.
    pub fn create_agent_executor(&self, logger: Logger) -> CrewAgentExecutor {
        let cache = self.cache.then(|| self.cache_handler.clone());
        CrewAgentExecutor::new(
            Arc::clone(&self.llm),
            AgentInfo {
                role: self.role.clone(),
                goal: self.goal.clone(),
                backstory: self.backstory.clone(),
            },
            self.tools.clone(),
            self.max_iter,
            ToolsHandler::new(cache),
            logger,
        )
        .with_step_callback(self.step_callback.clone())
    }

    /// MD5 of `role|goal|backstory`, computed from the uninterpolated text.
    pub fn key(&self) -> String {
        let role = self.original_role.as_deref().unwrap_or(&self.role);
        let goal = self.original_goal.as_deref().unwrap_or(&self.goal);
        let backstory = self
            .original_backstory
            .as_deref()
            .unwrap_or(&self.backstory);

        let source = format!("{}|{}|{}", role, goal, backstory);
        let mut hasher = Md5::new();
        hasher.update(source.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Interpolate inputs into the agent role, goal, and backstory.
    ///
    /// Always starts from the original text, so repeated calls do not
    /// compound.
    pub fn interpolate_inputs(&mut self, inputs: &HashMap<String, String>) {
        let role = self.original_role.get_or_insert_with(|| self.role.clone());
        let goal = self.original_goal.get_or_insert_with(|| self.goal.clone());
        let backstory = self
            .original_backstory
            .get_or_insert_with(|| self.backstory.clone());

        if inputs.is_empty() {
            return;
        }

        self.role = interpolate_string(role, inputs);
        self.goal = interpolate_string(goal, inputs);
        self.backstory = interpolate_string(backstory, inputs);
    }
}

/// Replace `{key}` with the corresponding value.
pub(crate) fn interpolate_string(template: &str, inputs: &HashMap<String, String>) -> String {
    let mut result = template.to_string();
    for (key, value) in inputs {
        let pattern = format!("{{{}}}", key);
        result = result.replace(&pattern, value);
    }
    result
}
