//! # receipt-crew
//!
//! Receipt PDF processing with two role-playing agents backed by a Gemini
//! model, plus a linter for requirements-style dependency manifests.
//!
//! The agent layer is a small sequential crew: a [`Crew`] runs its [`Task`]s
//! in order, each with the [`Agent`] whose role it names, and every agent
//! drives its tools through the text ReAct protocol
//! (`Thought` / `Action` / `Action Input` / `Observation` / `Final Answer`).
//!
//! - [`receipts`] - the extraction and aggregation crew and its report
//! - [`manifest`] - manifest parsing and lint checks

pub mod agent;
pub mod agents;
pub mod crew;
pub mod crews;
pub mod llms;
pub mod manifest;
pub mod process;
pub mod receipts;
pub mod task;
pub mod tasks;
pub mod tools;
pub mod types;
pub mod utilities;

pub use agent::Agent;
pub use crew::Crew;
pub use crews::crew_output::CrewOutput;
pub use llms::base_llm::BaseLLM;
pub use llms::providers::gemini::GeminiCompletion;
pub use manifest::{lint, parse_manifest, LintReport, Manifest};
pub use process::Process;
pub use receipts::ReceiptProcessingCrew;
pub use task::Task;
pub use tasks::task_output::TaskOutput;
pub use utilities::config::ReceiptConfig;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
