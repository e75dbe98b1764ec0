//! Consistency checks over a parsed manifest.
//!
//! Every package resolves to at most one pinned version, every pin is a
//! well-formed release string, and every line parses.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::{Manifest, ManifestLine, Requirement};

static VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\d+(?:\.\d+)*(?:(?:a|b|rc)\d+)?(?:\.post\d+)?(?:\.dev\d+)?(?:\+[A-Za-z0-9]+(?:[._-][A-Za-z0-9]+)*)?$",
    )
    .expect("Invalid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingKind {
    InvalidLine,
    ConflictingPin,
    DuplicatePackage,
    InvalidVersion,
}

impl FindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidLine => "invalid-line",
            Self::ConflictingPin => "conflicting-pin",
            Self::DuplicatePackage => "duplicate-package",
            Self::InvalidVersion => "invalid-version",
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single lint result, attached to a 1-based line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub line: usize,
    pub severity: Severity,
    pub kind: FindingKind,
    pub message: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}: {}[{}]: {}",
            self.line, self.severity, self.kind, self.message
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LintReport {
    pub requirement_count: usize,
    pub findings: Vec<Finding>,
}

impl LintReport {
    /// No errors. Warnings are allowed.
    pub fn is_clean(&self) -> bool {
        self.error_count() == 0
    }

    pub fn error_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
            .count()
    }
}

impl fmt::Display for LintReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for finding in &self.findings {
            writeln!(f, "{}", finding)?;
        }
        write!(
            f,
            "{} requirement(s), {} error(s), {} warning(s)",
            self.requirement_count,
            self.error_count(),
            self.warning_count()
        )
    }
}

/// Lint a manifest. Findings are ordered by line.
pub fn lint(manifest: &Manifest) -> LintReport {
    let mut findings = Vec::new();
    let mut seen: HashMap<&str, Vec<&Requirement>> = HashMap::new();
    let mut requirement_count = 0;

    for line in &manifest.lines {
        match line {
            ManifestLine::Invalid { line, reason, .. } => findings.push(Finding {
                line: *line,
                severity: Severity::Error,
                kind: FindingKind::InvalidLine,
                message: reason.clone(),
            }),
            ManifestLine::Requirement(req) => {
                requirement_count += 1;
                if let Some(version) = &req.version {
                    if !VERSION_RE.is_match(version) {
                        findings.push(invalid_version(req, version));
                    }
                }

                let prior = seen.entry(req.normalized_name.as_str()).or_default();
                if let Some(finding) = check_duplicate(req, prior) {
                    findings.push(finding);
                }
                prior.push(req);
            }
            ManifestLine::Blank | ManifestLine::Comment { .. } => {}
        }
    }

    findings.sort_by_key(|f| (f.line, f.severity, f.kind));
    LintReport {
        requirement_count,
        findings,
    }
}

fn invalid_version(req: &Requirement, version: &str) -> Finding {
    let message = if version.is_empty() {
        format!("package '{}' has an empty version after '=='", req.name)
    } else {
        format!(
            "package '{}' pins malformed version '{}'",
            req.name, version
        )
    };
    Finding {
        line: req.line,
        severity: Severity::Error,
        kind: FindingKind::InvalidVersion,
        message,
    }
}

fn check_duplicate(req: &Requirement, prior: &[&Requirement]) -> Option<Finding> {
    let first = prior.first()?;

    if let Some(version) = &req.version {
        let conflict = prior
            .iter()
            .find(|p| p.version.as_ref().is_some_and(|v| v != version));
        if let Some(other) = conflict {
            return Some(Finding {
                line: req.line,
                severity: Severity::Error,
                kind: FindingKind::ConflictingPin,
                message: format!(
                    "package '{}' pinned to {} conflicts with {} on line {}",
                    req.name,
                    version,
                    other.version.as_deref().unwrap_or_default(),
                    other.line
                ),
            });
        }
    }

    let message = if prior.iter().any(|p| p.version == req.version) {
        format!(
            "package '{}' is declared again (first on line {})",
            req.name, first.line
        )
    } else {
        format!(
            "package '{}' is declared both pinned and unpinned (first on line {})",
            req.name, first.line
        )
    };
    Some(Finding {
        line: req.line,
        severity: Severity::Warning,
        kind: FindingKind::DuplicatePackage,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::parse_manifest;

    fn kinds(report: &LintReport) -> Vec<(usize, FindingKind)> {
        report.findings.iter().map(|f| (f.line, f.kind)).collect()
    }

    #[test]
    fn test_clean_manifest() {
        let report = lint(&parse_manifest(
            "# Core\ncrewai==0.28.8\nlangchain==0.1.20\n\n# Optional: server\nuvicorn[standard]==0.29.0\npython-dotenv\n",
        ));
        assert!(report.is_clean());
        assert!(report.findings.is_empty());
        assert_eq!(report.requirement_count, 4);
    }

    #[test]
    fn test_conflicting_pin_reported_on_later_line() {
        let report = lint(&parse_manifest("crewai==0.28.8\n\nCrewAI==0.30.0\n"));
        assert!(!report.is_clean());
        assert_eq!(kinds(&report), vec![(3, FindingKind::ConflictingPin)]);
        assert!(report.findings[0].message.contains("on line 1"));
        assert!(report.findings[0].message.contains("0.28.8"));
    }

    #[test]
    fn test_conflict_behind_unpinned_first_declaration() {
        let report = lint(&parse_manifest("requests\nrequests==2.31.0\nrequests==2.32.0\n"));
        assert_eq!(
            kinds(&report),
            vec![
                (2, FindingKind::DuplicatePackage),
                (3, FindingKind::ConflictingPin)
            ]
        );
        assert!(report.findings[1].message.contains("on line 2"));
    }

    #[test]
    fn test_duplicates_are_warnings() {
        let report = lint(&parse_manifest("pypdf2==3.0.1\nPyPDF2==3.0.1\ngoogle_genai\ngoogle-genai\n"));
        assert!(report.is_clean());
        assert_eq!(
            kinds(&report),
            vec![
                (2, FindingKind::DuplicatePackage),
                (4, FindingKind::DuplicatePackage)
            ]
        );
        assert_eq!(report.warning_count(), 2);
    }

    #[test]
    fn test_pinned_and_unpinned_warns() {
        let report = lint(&parse_manifest("crewai\ncrewai==0.28.8\n"));
        assert_eq!(report.findings[0].severity, Severity::Warning);
        assert!(report.findings[0].message.contains("pinned and unpinned"));
    }

    #[test]
    fn test_invalid_versions() {
        let report = lint(&parse_manifest("a==\nb==latest\nc==1.0.0rc1\nd==2.0+local.1\ne==1.0.post2.dev3\n"));
        assert_eq!(
            kinds(&report),
            vec![(1, FindingKind::InvalidVersion), (2, FindingKind::InvalidVersion)]
        );
        assert!(report.findings[0].message.contains("empty version"));
    }

    #[test]
    fn test_invalid_line() {
        let report = lint(&parse_manifest("# deps\nrequests>=2.0\n"));
        assert_eq!(kinds(&report), vec![(2, FindingKind::InvalidLine)]);
        assert_eq!(report.findings[0].severity, Severity::Error);
    }

    #[test]
    fn test_empty_and_comment_only() {
        let report = lint(&parse_manifest(""));
        assert!(report.is_clean());
        assert_eq!(report.requirement_count, 0);

        assert!(lint(&parse_manifest("#\n")).findings.is_empty());
    }

    #[test]
    fn test_report_serialization_and_display() {
        let report = lint(&parse_manifest("a==1\na==2\n"));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["findings"][0]["kind"], "conflicting-pin");
        assert_eq!(json["findings"][0]["severity"], "error");

        let text = report.to_string();
        assert!(text.starts_with("line 2: error[conflicting-pin]:"));
        assert!(text.ends_with("2 requirement(s), 1 error(s), 0 warning(s)"));
    }
}
