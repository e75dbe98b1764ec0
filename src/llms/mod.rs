//! LLM layer.
//!
//! - [`base_llm`] - The base trait every LLM implementation follows
//! - [`providers`] - Native REST provider implementations

pub mod base_llm;
pub mod providers;

#[cfg(test)]
pub(crate) mod testing;

pub use base_llm::{BaseLLM, BaseLLMState, LLMMessage};
pub use providers::gemini::GeminiCompletion;
