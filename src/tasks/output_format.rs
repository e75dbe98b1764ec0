//! Task output format definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Output format of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Output parsed into a JSON value.
    #[serde(rename = "json")]
    JSON,
    /// Output as raw unprocessed string.
    #[default]
    Raw,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::JSON => write!(f, "json"),
            OutputFormat::Raw => write!(f, "raw"),
        }
    }
}
