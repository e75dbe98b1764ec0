//! Runtime configuration for receipt processing.
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! environment variables. Command-line flags are applied last by the binary.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default Gemini model used by both agents.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f64 = 0.1;
/// File the extraction agent writes.
pub const DEFAULT_EXTRACTED_FILE: &str = "extracted_receipts.json";
/// File the aggregation agent writes.
pub const DEFAULT_AGGREGATED_FILE: &str = "aggregated_receipts.json";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Receipt processing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiptConfig {
    /// Directory containing receipt PDFs.
    pub pdf_directory: PathBuf,
    /// Directory that relative tool paths and the JSON outputs resolve against.
    pub working_dir: PathBuf,
    /// Gemini model name.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Maximum ReAct iterations per task.
    pub max_iter: u32,
    /// Print agent progress to the console.
    pub verbose: bool,
    /// Output file of the extraction task.
    pub extracted_file: String,
    /// Output file of the aggregation task.
    pub aggregated_file: String,
    /// Gemini API key; falls back to the provider's environment lookup.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        Self {
            pdf_directory: PathBuf::from("./receipt_pdfs"),
            working_dir: PathBuf::from("."),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_iter: 25,
            verbose: true,
            extracted_file: DEFAULT_EXTRACTED_FILE.to_string(),
            aggregated_file: DEFAULT_AGGREGATED_FILE.to_string(),
            api_key: None,
        }
    }
}

impl ReceiptConfig {
    /// Load configuration from a YAML file. Missing keys keep their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build the effective configuration: defaults, optional YAML file, environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_yaml_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay values from an environment lookup function.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("RECEIPT_CREW_PDF_DIR") {
            self.pdf_directory = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("RECEIPT_CREW_WORKDIR") {
            self.working_dir = PathBuf::from(dir);
        }
        if let Some(model) = lookup("RECEIPT_CREW_MODEL") {
            self.model = model;
        }
        if let Some(raw) = lookup("RECEIPT_CREW_TEMPERATURE") {
            self.temperature = raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "RECEIPT_CREW_TEMPERATURE".to_string(),
                value: raw.clone(),
            })?;
        }
        if let Some(key) = lookup("GOOGLE_API_KEY").or_else(|| lookup("GEMINI_API_KEY")) {
            self.api_key = Some(key);
        }
        Ok(())
    }

    /// Reject values the crew cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "model".to_string(),
                value: self.model.clone(),
            });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidValue {
                key: "temperature".to_string(),
                value: self.temperature.to_string(),
            });
        }
        if self.max_iter == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_iter".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Path of the extraction output file.
    pub fn extracted_path(&self) -> PathBuf {
        self.working_dir.join(&self.extracted_file)
    }

    /// Path of the aggregation output file.
    pub fn aggregated_path(&self) -> PathBuf {
        self.working_dir.join(&self.aggregated_file)
    }

    /// The PDF directory resolved against the working directory.
    pub fn pdf_path(&self) -> PathBuf {
        self.working_dir.join(&self.pdf_directory)
    }

    /// Create the PDF directory if it does not exist yet.
    pub fn ensure_pdf_directory(&self) -> Result<(), ConfigError> {
        let path = self.pdf_path();
        std::fs::create_dir_all(&path).map_err(|source| ConfigError::CreateDir { path, source })
    }
}
