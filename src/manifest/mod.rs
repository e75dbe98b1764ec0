//! Requirements-style dependency manifests.
//!
//! A manifest is one package per line with an optional `==` pin, `#`
//! comment lines that act as section headers, and blank separator lines.
//! [`parse_manifest`] never fails; malformed lines are kept as
//! [`ManifestLine::Invalid`] so [`lint`] can report them.

pub mod lint;
pub mod parser;

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

pub use lint::{lint, Finding, FindingKind, LintReport, Severity};
pub use parser::{normalize_name, parse_manifest};

/// Manifest loading errors.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A single package declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requirement {
    /// 1-based line number.
    pub line: usize,
    /// The line as written, without surrounding whitespace.
    pub raw: String,
    pub name: String,
    /// Lowercased name with runs of `-`, `_` and `.` collapsed to `-`.
    pub normalized_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extras: Vec<String>,
    /// The exact pin, when the line has one.
    pub version: Option<String>,
    /// Text of the closest comment line above.
    pub section: Option<String>,
}

/// One line of a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ManifestLine {
    Blank,
    Comment { text: String },
    Requirement(Requirement),
    Invalid {
        line: usize,
        raw: String,
        reason: String,
    },
}

/// A parsed manifest, one entry per input line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Manifest {
    pub lines: Vec<ManifestLine>,
}

impl Manifest {
    /// Read and parse a manifest file.
    pub fn from_path(path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(parse_manifest(&text))
    }

    pub fn requirements(&self) -> impl Iterator<Item = &Requirement> {
        self.lines.iter().filter_map(|line| match line {
            ManifestLine::Requirement(req) => Some(req),
            _ => None,
        })
    }

    /// Look a package up by name, ignoring case and separator differences.
    pub fn get(&self, name: &str) -> Option<&Requirement> {
        let wanted = normalize_name(name);
        self.requirements().find(|req| req.normalized_name == wanted)
    }

    /// Section headers in order of appearance.
    pub fn sections(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|line| match line {
                ManifestLine::Comment { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}
