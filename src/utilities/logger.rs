//! Verbose progress logger for agents and crews.
//!
//! Progress lines go to the console through [`Printer`] when verbose mode is
//! on, and always to the `log` facade at debug level.

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::utilities::printer::{Printer, PrinterColor};

/// Logger with optional verbose console output and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logger {
    /// Enables verbose console output with timestamps.
    pub verbose: bool,
    #[serde(default = "default_color")]
    pub default_color: PrinterColor,
    #[serde(skip)]
    printer: Printer,
}

fn default_color() -> PrinterColor {
    PrinterColor::BoldYellow
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Logger {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            default_color: default_color(),
            printer: Printer::default(),
        }
    }

    /// Log a message, printing it with a timestamp if verbose mode is enabled.
    pub fn log(&self, level: &str, message: &str, color: Option<PrinterColor>) {
        log::debug!("[{}] {}", level, message);
        if self.verbose {
            let color = color.unwrap_or(self.default_color);
            self.printer.print(&format_line(level, message), color);
        }
    }

    /// Announce that an agent started working on a task.
    pub fn agent_started(&self, role: &str, task: &str) {
        self.log(
            "info",
            &format!("# Agent: {}\n## Task: {}", role, task),
            Some(PrinterColor::BoldPurple),
        );
    }

    /// Announce a tool call and its observation.
    pub fn tool_used(&self, role: &str, tool: &str, input: &str, observation: &str) {
        self.log(
            "info",
            &format!(
                "# Agent: {}\n## Using tool: {}\n## Tool Input: {}\n## Tool Output: {}",
                role, tool, input, observation
            ),
            Some(PrinterColor::BoldBlue),
        );
    }

    /// Announce an agent's final answer.
    pub fn final_answer(&self, role: &str, answer: &str) {
        self.log(
            "info",
            &format!("# Agent: {}\n## Final Answer:\n{}", role, answer),
            Some(PrinterColor::BoldGreen),
        );
    }
}

fn format_line(level: &str, message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    format!("\n[{}][{}]: {}", timestamp, level.to_uppercase(), message)
}
