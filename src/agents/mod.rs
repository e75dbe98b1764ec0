//! Agent execution machinery: the ReAct executor, its output parser, and
//! tool usage caching.

pub mod cache;
pub mod crew_agent_executor;
pub mod parser;
pub mod tools_handler;

pub use cache::CacheHandler;
pub use crew_agent_executor::{CrewAgentExecutor, StepCallback};
pub use parser::{AgentAction, AgentFinish, OutputParserError, ParseResult};
pub use tools_handler::{ToolCalling, ToolsHandler};
