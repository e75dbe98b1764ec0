//! Role-playing agent that executes tasks through the ReAct executor.

pub mod core;

pub use self::core::Agent;
