//! In-memory cache of tool observations.
//!
//! Entries are keyed by `"{tool}-{input}"`, so repeating an identical tool
//! call returns the earlier observation without running the tool again.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// Shared cache of tool observations.
///
/// Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct CacheHandler {
    cache: Arc<RwLock<HashMap<String, String>>>,
}

impl CacheHandler {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(tool: &str, input: &str) -> String {
        format!("{}-{}", tool, input)
    }

    /// Store the observation for a tool call.
    pub fn add(&self, tool: &str, input: &str, output: impl Into<String>) {
        self.cache.write().insert(Self::key(tool, input), output.into());
    }

    /// Look up a previous observation for the same tool and input.
    pub fn read(&self, tool: &str, input: &str) -> Option<String> {
        self.cache.read().get(&Self::key(tool, input)).cloned()
    }

    pub fn clear(&self) {
        self.cache.write().clear();
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_add_and_read() {
        let cache = CacheHandler::new();
        cache.add("read_json_file", "{\"filename\":\"a.json\"}", "[]");
        assert_eq!(
            cache.read("read_json_file", "{\"filename\":\"a.json\"}"),
            Some("[]".to_string())
        );
        assert_eq!(cache.read("read_json_file", "{\"filename\":\"b.json\"}"), None);
    }

    #[test]
    fn test_cache_clear() {
        let cache = CacheHandler::new();
        cache.add("tool", "input", "out");
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_shared_between_clones_and_threads() {
        use std::thread;

        let cache = CacheHandler::new();
        let writer_cache = cache.clone();
        let writer = thread::spawn(move || {
            for i in 0..50 {
                writer_cache.add("tool", &format!("input_{}", i), i.to_string());
            }
        });
        writer.join().unwrap();

        assert_eq!(cache.len(), 50);
        assert_eq!(cache.read("tool", "input_7"), Some("7".to_string()));
    }
}
