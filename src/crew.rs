//! Main Crew struct.
//!
//! A crew owns its agents and tasks and runs the tasks in order. Every task
//! receives the raw outputs of all earlier tasks as context.

use md5::{Digest, Md5};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::agent::core::Agent;
use crate::agents::cache::CacheHandler;
use crate::agents::crew_agent_executor::StepCallback;
use crate::crews::crew_output::CrewOutput;
use crate::process::Process;
use crate::task::{Task, TaskCallback};
use crate::tasks::task_output::TaskOutput;
use crate::types::usage_metrics::UsageMetrics;
use crate::utilities::errors::CrewError;
use crate::utilities::logger::Logger;
use crate::utilities::printer::PrinterColor;

/// Separator placed between earlier task outputs in a task's context.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Callback run before kickoff; may rewrite the inputs.
pub type BeforeKickoffCallback =
    Arc<dyn Fn(HashMap<String, String>) -> HashMap<String, String> + Send + Sync>;

/// Callback run after kickoff; may rewrite the output.
pub type AfterKickoffCallback = Arc<dyn Fn(CrewOutput) -> CrewOutput + Send + Sync>;

/// A group of agents and the tasks they perform.
pub struct Crew {
    pub id: Uuid,
    pub name: Option<String>,
    pub agents: Vec<Agent>,
    pub tasks: Vec<Task>,
    pub process: Process,
    /// Indicates the verbosity level for logging during execution.
    pub verbose: bool,
    /// Callback to be executed after each step for agents without their own.
    pub step_callback: Option<StepCallback>,
    /// Callback to be executed after each task.
    pub task_callback: Option<TaskCallback>,
    pub before_kickoff_callbacks: Vec<BeforeKickoffCallback>,
    pub after_kickoff_callbacks: Vec<AfterKickoffCallback>,
    /// Metrics for the LLM usage during the last kickoff.
    pub usage_metrics: Option<UsageMetrics>,
    /// Tool cache shared by the agents during one kickoff.
    cache_handler: CacheHandler,
}

impl std::fmt::Debug for Crew {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crew")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("process", &self.process)
            .field("agents", &self.agents.iter().map(|a| a.role.as_str()).collect::<Vec<_>>())
            .field("tasks", &self.tasks.len())
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Display for Crew {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Crew(id={}, process={}, number_of_agents={}, number_of_tasks={})",
            self.id,
            self.process,
            self.agents.len(),
            self.tasks.len()
        )
    }
}

impl Crew {
    pub fn new(agents: Vec<Agent>, tasks: Vec<Task>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: None,
            agents,
            tasks,
            process: Process::Sequential,
            verbose: false,
            step_callback: None,
            task_callback: None,
            before_kickoff_callbacks: Vec::new(),
            after_kickoff_callbacks: Vec::new(),
            usage_metrics: None,
            cache_handler: CacheHandler::new(),
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_process(mut self, process: Process) -> Self {
        self.process = process;
        self
    }

    pub fn get_agent(&self, role: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.role == role)
    }

    /// MD5 of the agent keys and task keys joined by `|`.
    pub fn key(&self) -> String {
        let source: Vec<String> = self
            .agents
            .iter()
            .map(Agent::key)
            .chain(self.tasks.iter().map(Task::key))
            .collect();
        let mut hasher = Md5::new();
        hasher.update(source.join("|").as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Execute the crew's workflow.
    ///
    /// `inputs` are interpolated into every task and agent before the run.
    pub async fn kickoff(
        &mut self,
        inputs: Option<HashMap<String, String>>,
    ) -> Result<CrewOutput, CrewError> {
        let mut current_inputs = inputs.unwrap_or_default();
        for callback in &self.before_kickoff_callbacks {
            current_inputs = callback(current_inputs);
        }
        self.interpolate_inputs(&current_inputs);
        self.propagate_step_callback();
        self.reset_cache();

        let logger = Logger::new(self.verbose);
        logger.log(
            "info",
            &format!("Crew execution started: {}", self.display_name()),
            Some(PrinterColor::BoldCyan),
        );

        let result = match self.process {
            Process::Sequential => self.execute_tasks().await,
        };
        self.usage_metrics = Some(self.calculate_usage_metrics());

        let mut output = match result {
            Ok(output) => output,
            Err(e) => {
                logger.log(
                    "error",
                    &format!("Crew execution failed: {}", e),
                    Some(PrinterColor::Red),
                );
                return Err(e);
            }
        };

        for callback in &self.after_kickoff_callbacks {
            output = callback(output);
        }

        logger.log(
            "info",
            &format!("Crew execution completed: {}", self.display_name()),
            Some(PrinterColor::BoldGreen),
        );
        Ok(output)
    }

    /// Sum token usage across the crew's LLMs, counting each shared LLM once.
    pub fn calculate_usage_metrics(&self) -> UsageMetrics {
        let mut seen: Vec<*const ()> = Vec::new();
        let mut total = UsageMetrics::new();
        for agent in &self.agents {
            let ptr = Arc::as_ptr(&agent.llm) as *const ();
            if seen.contains(&ptr) {
                continue;
            }
            seen.push(ptr);
            total.add_usage_metrics(&agent.llm.get_token_usage_summary());
        }
        total
    }

    fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.id.to_string())
    }

    fn interpolate_inputs(&mut self, inputs: &HashMap<String, String>) {
        for task in &mut self.tasks {
            task.interpolate_inputs(inputs);
        }
        for agent in &mut self.agents {
            agent.interpolate_inputs(inputs);
        }
    }

    /// Start every kickoff from an empty tool cache.
    fn reset_cache(&mut self) {
        self.cache_handler = CacheHandler::new();
        for agent in &mut self.agents {
            agent.set_cache_handler(self.cache_handler.clone());
        }
    }

    fn propagate_step_callback(&mut self) {
        if let Some(callback) = &self.step_callback {
            for agent in self.agents.iter_mut().filter(|a| a.step_callback.is_none()) {
                agent.step_callback = Some(Arc::clone(callback));
            }
        }
    }

    async fn execute_tasks(&mut self) -> Result<CrewOutput, CrewError> {
        let mut task_outputs: Vec<TaskOutput> = Vec::new();

        for idx in 0..self.tasks.len() {
            let context = (!task_outputs.is_empty()).then(|| {
                task_outputs
                    .iter()
                    .map(|o| o.raw.as_str())
                    .collect::<Vec<&str>>()
                    .join(CONTEXT_SEPARATOR)
            });

            let agent_idx = self.resolve_agent(&self.tasks[idx])?;
            let agent = &mut self.agents[agent_idx];
            let task = &mut self.tasks[idx];

            let task_output = task.execute(agent, context.as_deref()).await?;

            if let Some(callback) = &self.task_callback {
                callback(&task_output);
            }
            task_outputs.push(task_output);
        }

        self.create_crew_output(task_outputs)
    }

    fn resolve_agent(&self, task: &Task) -> Result<usize, CrewError> {
        let role = task
            .agent
            .as_deref()
            .ok_or_else(|| CrewError::NoAgentAssigned(task.description.clone()))?;
        self.agents
            .iter()
            .position(|a| a.role == role)
            .ok_or_else(|| CrewError::UnknownAgent(role.to_string()))
    }

    fn create_crew_output(&self, task_outputs: Vec<TaskOutput>) -> Result<CrewOutput, CrewError> {
        let final_task_output = task_outputs
            .iter()
            .rev()
            .find(|t| !t.raw.is_empty())
            .ok_or(CrewError::NoOutputs)?;

        Ok(CrewOutput {
            raw: final_task_output.raw.clone(),
            json_dict: final_task_output.json_dict.clone(),
            token_usage: self.calculate_usage_metrics(),
            tasks_output: task_outputs,
        })
    }
}
