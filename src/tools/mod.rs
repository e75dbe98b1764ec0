//! Tools agents can call.

pub mod base_tool;
pub mod receipt_tools;
pub mod structured_tool;

pub use base_tool::{BaseTool, ToolFn};
pub use receipt_tools::ReceiptTools;
pub use structured_tool::CrewStructuredTool;
