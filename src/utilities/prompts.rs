//! Prompt generation for ReAct agents.
//!
//! Prompt text is assembled from named slices; `{role}`, `{goal}`,
//! `{backstory}`, `{tools}` and `{tool_names}` placeholders are filled in
//! when the slices are joined.

use serde::{Deserialize, Serialize};

const ROLE_PLAYING: &str = "You are {role}. {backstory}\nYour personal goal is: {goal}";

const TOOLS: &str = "\nYou ONLY have access to the following tools, and should NEVER make up tools that are not listed here:\n\n{tools}\n\nIMPORTANT: Use the following format in your response:\n\n```\nThought: you should always think about what to do\nAction: the action to take, only one name of [{tool_names}], just the name, exactly as it's written.\nAction Input: the input to the action, just a simple JSON object, enclosed in curly braces, using \" to wrap keys and values.\nObservation: the result of the action\n```\n\nOnce all necessary information is gathered, return the following format:\n\n```\nThought: I now know the final answer\nFinal Answer: the final answer to the original input question\n```";

const NO_TOOLS: &str = "\nTo give my best complete final answer to the task respond using the exact following format:\n\nThought: I now can give a great answer\nFinal Answer: Your final answer must be the great and the most complete as possible, it must be outcome described.\n\nI MUST use these formats, my job depends on it!";

const TASK: &str = "\nCurrent Task: {input}\n\nBegin! This is VERY important to you, use the tools available and give your best Final Answer, your job depends on it!\n\nThought:";

const TASK_NO_TOOLS: &str = "\nCurrent Task: {input}\n\nBegin! This is VERY important to you, your job depends on it!\n\nThought:";

const TASK_WITH_CONTEXT: &str = "{task}\n\nContext:\n{context}";

/// Message appended once the iteration budget is spent.
pub const FORCE_FINAL_ANSWER: &str = "Now it's time you MUST give your absolute best final answer. You'll ignore all previous instructions, stop using any tools, and just return your absolute BEST Final answer.";

/// Observation reported when the model names a tool that does not exist.
pub fn tool_not_found(tool: &str, tool_names: &str) -> String {
    format!(
        "Action '{}' don't exist, these are the only available Actions:\n{}",
        tool, tool_names
    )
}

/// Observation reported when a tool call fails.
pub fn tool_usage_error(error: &str) -> String {
    format!(
        "I encountered an error while trying to use the tool. This was the error: {}.\nMoving on then. I MUST either use a tool (use one at time) OR give my best final answer not both at the same time.",
        error
    )
}

/// Fill `{task}` and `{context}` into the context slice.
pub fn task_with_context(task: &str, context: &str) -> String {
    TASK_WITH_CONTEXT
        .replace("{task}", task)
        .replace("{context}", context)
}

/// Result with system and user prompts split apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemPromptResult {
    /// The system prompt component.
    pub system: String,
    /// The user prompt component.
    pub user: String,
}

/// Component identifiers for prompt building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptComponent {
    RolePlaying,
    Tools,
    NoTools,
    Task,
    TaskNoTools,
}

impl PromptComponent {
    fn text(&self) -> &'static str {
        match self {
            Self::RolePlaying => ROLE_PLAYING,
            Self::Tools => TOOLS,
            Self::NoTools => NO_TOOLS,
            Self::Task => TASK,
            Self::TaskNoTools => TASK_NO_TOOLS,
        }
    }
}

/// Agent info needed for prompt interpolation.
#[derive(Debug, Clone, Default)]
pub struct AgentInfo {
    pub goal: String,
    pub role: String,
    pub backstory: String,
}

/// Builds the system/user prompt pair for an agent.
#[derive(Debug, Clone, Default)]
pub struct Prompts {
    /// Rendered tool descriptions, one block per tool.
    pub tools: Vec<String>,
    /// Tool names in declaration order.
    pub tool_names: Vec<String>,
}

impl Prompts {
    pub fn new(tools: Vec<String>, tool_names: Vec<String>) -> Self {
        Self { tools, tool_names }
    }

    pub fn has_tools(&self) -> bool {
        !self.tool_names.is_empty()
    }

    /// Generate the prompts for executing `input` as `agent`.
    pub fn task_execution(&self, agent: &AgentInfo, input: &str) -> SystemPromptResult {
        let (system_slices, task_slice) = if self.has_tools() {
            (
                [PromptComponent::RolePlaying, PromptComponent::Tools],
                PromptComponent::Task,
            )
        } else {
            (
                [PromptComponent::RolePlaying, PromptComponent::NoTools],
                PromptComponent::TaskNoTools,
            )
        };

        SystemPromptResult {
            system: self.build_prompt(&system_slices, agent),
            user: self
                .build_prompt(&[task_slice], agent)
                .replace("{input}", input),
        }
    }

    fn build_prompt(&self, components: &[PromptComponent], agent: &AgentInfo) -> String {
        components
            .iter()
            .map(PromptComponent::text)
            .collect::<String>()
            .replace("{tools}", &self.tools.join("\n"))
            .replace("{tool_names}", &self.tool_names.join(", "))
            .replace("{goal}", &agent.goal)
            .replace("{role}", &agent.role)
            .replace("{backstory}", &agent.backstory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> AgentInfo {
        AgentInfo {
            role: "Extractor".to_string(),
            goal: "Extract totals".to_string(),
            backstory: "Reads receipts.".to_string(),
        }
    }

    #[test]
    fn test_task_execution_with_tools() {
        let prompts = Prompts::new(
            vec!["Tool Name: list_pdf_files".to_string()],
            vec!["list_pdf_files".to_string()],
        );
        let result = prompts.task_execution(&agent(), "List the receipts");

        assert!(result
            .system
            .starts_with("You are Extractor. Reads receipts.\nYour personal goal is: Extract totals"));
        assert!(result.system.contains("Tool Name: list_pdf_files"));
        assert!(result.system.contains("only one name of [list_pdf_files]"));
        assert!(result.user.contains("Current Task: List the receipts"));
        assert!(result.user.ends_with("Thought:"));
    }

    #[test]
    fn test_task_execution_without_tools() {
        let result = Prompts::default().task_execution(&agent(), "Summarize");
        assert!(result.system.contains("Final Answer: Your final answer"));
        assert!(!result.system.contains("Action Input"));
        assert!(!result.user.contains("use the tools available"));
    }

    #[test]
    fn test_task_with_context() {
        let text = task_with_context("Aggregate", "[1, 2]");
        assert_eq!(text, "Aggregate\n\nContext:\n[1, 2]");
    }

    #[test]
    fn test_tool_not_found_lists_names() {
        let text = tool_not_found("fly", "read_json_file, save_json_data");
        assert!(text.starts_with("Action 'fly' don't exist"));
        assert!(text.ends_with("read_json_file, save_json_data"));
    }
}
