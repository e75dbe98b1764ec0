//! Tool usage bookkeeping for the agent executor.
//!
//! Tracks the last tool call and feeds observations into the cache.

use serde::{Deserialize, Serialize};

use super::cache::CacheHandler;

/// A single tool invocation as written by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCalling {
    pub tool_name: String,
    pub tool_input: String,
}

impl ToolCalling {
    pub fn new(tool_name: impl Into<String>, tool_input: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            tool_input: tool_input.into(),
        }
    }
}

/// Records tool usage and optionally caches outputs.
#[derive(Debug, Clone, Default)]
pub struct ToolsHandler {
    pub cache: Option<CacheHandler>,
    pub last_used_tool: Option<ToolCalling>,
}

impl ToolsHandler {
    pub fn new(cache: Option<CacheHandler>) -> Self {
        Self {
            cache,
            last_used_tool: None,
        }
    }

    /// Return a cached observation for this call, if any.
    pub fn cached(&self, calling: &ToolCalling) -> Option<String> {
        self.cache
            .as_ref()
            .and_then(|cache| cache.read(&calling.tool_name, &calling.tool_input))
    }

    /// Handle a completed tool call.
    pub fn on_tool_use(&mut self, calling: &ToolCalling, output: &str, should_cache: bool) {
        self.last_used_tool = Some(calling.clone());

        if should_cache {
            if let Some(cache) = &self.cache {
                cache.add(&calling.tool_name, &calling.tool_input, output);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_on_tool_use_caches_when_requested() {
        let mut handler = ToolsHandler::new(Some(CacheHandler::new()));
        let calling = ToolCalling::new("list_pdf_files", "{\"directory\":\"r\"}");

        handler.on_tool_use(&calling, "[\"a.pdf\"]", true);
        assert_eq!(handler.last_used_tool.as_ref(), Some(&calling));
        assert_eq!(handler.cached(&calling), Some("[\"a.pdf\"]".to_string()));
    }

    #[test]
    fn test_on_tool_use_skips_cache() {
        let mut handler = ToolsHandler::new(Some(CacheHandler::new()));
        let calling = ToolCalling::new("save_json_data", "{}");

        handler.on_tool_use(&calling, "saved", false);
        assert_eq!(handler.cached(&calling), None);

        let mut no_cache = ToolsHandler::default();
        no_cache.on_tool_use(&calling, "saved", true);
        assert_eq!(no_cache.cached(&calling), None);
    }
}
