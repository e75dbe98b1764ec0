//! Filesystem tools used by the receipt agents.
//!
//! All tools resolve relative paths against the working directory the
//! `ReceiptTools` instance was created with. Failures are reported as
//! [`ToolError::Execution`] with the message the agent will see.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Value};

use super::structured_tool::CrewStructuredTool;
use crate::utilities::config::DEFAULT_EXTRACTED_FILE;
use crate::utilities::errors::ToolError;

pub const EXTRACT_TEXT_FROM_PDF: &str = "extract_text_from_pdf";
pub const SAVE_JSON_DATA: &str = "save_json_data";
pub const READ_JSON_FILE: &str = "read_json_file";
pub const LIST_PDF_FILES: &str = "list_pdf_files";

/// Receipt processing tools rooted at a working directory.
#[derive(Debug, Clone)]
pub struct ReceiptTools {
    base_dir: PathBuf,
}

impl ReceiptTools {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Extract the text of every page of a PDF, trimmed.
    pub fn extract_text_from_pdf(&self, pdf_path: &str) -> Result<String, ToolError> {
        let path = self.resolve(pdf_path);
        log::debug!("Extracting text from {}", path.display());

        let bytes = std::fs::read(&path)
            .map_err(|e| ToolError::Execution(format!("Error reading PDF: {}", e)))?;

        // pdf-extract panics on some malformed documents.
        let extracted = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem(&bytes)
        }))
        .map_err(|_| ToolError::Execution("Error reading PDF: malformed document".to_string()))?;

        let text = extracted.map_err(|e| ToolError::Execution(format!("Error reading PDF: {}", e)))?;
        Ok(text.trim().to_string())
    }

    /// Save `data` as pretty-printed JSON.
    ///
    /// `data` is stored as parsed JSON when it is valid JSON, otherwise as a
    /// JSON string.
    pub fn save_json_data(&self, data: &str, filename: Option<&str>) -> Result<String, ToolError> {
        let filename = filename.unwrap_or(DEFAULT_EXTRACTED_FILE);
        let parsed: Value =
            serde_json::from_str(data).unwrap_or_else(|_| Value::String(data.to_string()));
        self.write_json(filename, &parsed)
            .map_err(|e| ToolError::Execution(format!("Error saving data: {}", e)))?;
        Ok(format!("Data saved successfully to {}", filename))
    }

    fn write_json(&self, filename: &str, value: &Value) -> std::io::Result<()> {
        let path = self.resolve(filename);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(value)?;
        std::fs::write(path, content)
    }

    /// Read a JSON file and return it pretty-printed.
    pub fn read_json_file(&self, filename: &str) -> Result<String, ToolError> {
        let read = || -> Result<String, Box<dyn std::error::Error>> {
            let content = std::fs::read_to_string(self.resolve(filename))?;
            let value: Value = serde_json::from_str(&content)?;
            Ok(serde_json::to_string_pretty(&value)?)
        };
        read().map_err(|e| ToolError::Execution(format!("Error reading file: {}", e)))
    }

    /// List the PDF files (case-insensitive `.pdf` suffix) in a directory, sorted by name.
    pub fn list_pdf_files(&self, directory: &str) -> Result<Vec<String>, ToolError> {
        let entries = std::fs::read_dir(self.resolve(directory))
            .map_err(|e| ToolError::Execution(format!("Error listing files: {}", e)))?;

        let mut pdf_files = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| ToolError::Execution(format!("Error listing files: {}", e)))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.to_lowercase().ends_with(".pdf") {
                pdf_files.push(name);
            }
        }
        pdf_files.sort();
        Ok(pdf_files)
    }

    pub fn extract_text_tool(&self) -> CrewStructuredTool {
        let tools = self.clone();
        CrewStructuredTool::new(
            EXTRACT_TEXT_FROM_PDF,
            "Extract text from a PDF file.",
            json!({
                "type": "object",
                "properties": {
                    "pdf_path": { "type": "string", "description": "Path of the PDF file" }
                },
                "required": ["pdf_path"]
            }),
            Arc::new(move |args: HashMap<String, Value>| {
                let path = string_arg(EXTRACT_TEXT_FROM_PDF, &args, "pdf_path")?;
                tools.extract_text_from_pdf(&path).map(Value::String)
            }),
        )
    }

    pub fn save_json_tool(&self) -> CrewStructuredTool {
        let tools = self.clone();
        CrewStructuredTool::new(
            SAVE_JSON_DATA,
            "Save extracted data to a JSON file.",
            json!({
                "type": "object",
                "properties": {
                    "data": { "type": "string", "description": "JSON text to save" },
                    "filename": {
                        "type": "string",
                        "description": "Target file name",
                        "default": DEFAULT_EXTRACTED_FILE
                    }
                },
                "required": ["data"]
            }),
            Arc::new(move |args: HashMap<String, Value>| {
                // Agents often pass the data as a JSON value instead of a string.
                let data = match args.get("data") {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => {
                        return Err(ToolError::InvalidArguments {
                            tool: SAVE_JSON_DATA.to_string(),
                            message: "missing required argument 'data'".to_string(),
                        })
                    }
                };
                let filename = args.get("filename").and_then(Value::as_str);
                tools.save_json_data(&data, filename).map(Value::String)
            }),
        )
        .with_cache(false)
    }

    pub fn read_json_tool(&self) -> CrewStructuredTool {
        let tools = self.clone();
        CrewStructuredTool::new(
            READ_JSON_FILE,
            "Read data from a JSON file.",
            json!({
                "type": "object",
                "properties": {
                    "filename": { "type": "string", "description": "File to read" }
                },
                "required": ["filename"]
            }),
            Arc::new(move |args: HashMap<String, Value>| {
                let filename = string_arg(READ_JSON_FILE, &args, "filename")?;
                tools.read_json_file(&filename).map(Value::String)
            }),
        )
    }

    pub fn list_pdf_files_tool(&self) -> CrewStructuredTool {
        let tools = self.clone();
        CrewStructuredTool::new(
            LIST_PDF_FILES,
            "List all PDF files in a directory.",
            json!({
                "type": "object",
                "properties": {
                    "directory": { "type": "string", "description": "Directory to scan" }
                },
                "required": ["directory"]
            }),
            Arc::new(move |args: HashMap<String, Value>| {
                let directory = string_arg(LIST_PDF_FILES, &args, "directory")?;
                tools.list_pdf_files(&directory).map(|files| json!(files))
            }),
        )
    }

    /// Tools for the extraction agent.
    pub fn extraction_tools(&self) -> Vec<CrewStructuredTool> {
        vec![
            self.extract_text_tool(),
            self.save_json_tool(),
            self.list_pdf_files_tool(),
        ]
    }

    /// Tools for the aggregation agent.
    pub fn aggregation_tools(&self) -> Vec<CrewStructuredTool> {
        vec![self.read_json_tool(), self.save_json_tool()]
    }
}

fn string_arg(tool: &str, args: &HashMap<String, Value>, key: &str) -> Result<String, ToolError> {
    match args.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Ok(other.to_string()),
        None => Err(ToolError::InvalidArguments {
            tool: tool.to_string(),
            message: format!("missing required argument '{}'", key),
        }),
    }
}
