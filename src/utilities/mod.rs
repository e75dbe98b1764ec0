//! Shared utilities: configuration, errors, console output and prompts.

pub mod config;
pub mod errors;
pub mod logger;
pub mod printer;
pub mod prompts;
