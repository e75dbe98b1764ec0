//! Line-oriented manifest parser.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Manifest, ManifestLine, Requirement};

static REQUIREMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<name>[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)\s*(?:\[(?P<extras>[^\]]*)\])?\s*(?:(?P<op>===|==|~=|!=|<=|>=|<|>)\s*(?P<version>.*))?$",
    )
    .expect("Invalid regex")
});

static EXTRA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?$").expect("Invalid regex")
});

static INLINE_COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+#.*$").expect("Invalid regex"));

static SEPARATOR_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-_.]+").expect("Invalid regex"));

/// Lowercase `name` and collapse runs of `-`, `_` and `.` into `-`.
pub fn normalize_name(name: &str) -> String {
    SEPARATOR_RUN_RE
        .replace_all(&name.to_lowercase(), "-")
        .into_owned()
}

/// Parse manifest text. Never fails; bad lines become [`ManifestLine::Invalid`].
///
/// A comment line opens a section that lasts until the next comment line.
/// Blank lines do not close it.
pub fn parse_manifest(text: &str) -> Manifest {
    let mut section: Option<String> = None;
    let mut lines = Vec::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = raw_line.trim();

        if trimmed.is_empty() {
            lines.push(ManifestLine::Blank);
            continue;
        }

        if let Some(comment) = trimmed.strip_prefix('#') {
            let text = comment.trim().to_string();
            section = (!text.is_empty()).then(|| text.clone());
            lines.push(ManifestLine::Comment { text });
            continue;
        }

        let declaration = INLINE_COMMENT_RE.replace(trimmed, "");
        let parsed = match parse_declaration(declaration.trim()) {
            Ok(decl) => ManifestLine::Requirement(Requirement {
                line: line_no,
                raw: trimmed.to_string(),
                normalized_name: normalize_name(&decl.name),
                name: decl.name,
                extras: decl.extras,
                version: decl.version,
                section: section.clone(),
            }),
            Err(reason) => ManifestLine::Invalid {
                line: line_no,
                raw: trimmed.to_string(),
                reason,
            },
        };
        lines.push(parsed);
    }

    Manifest { lines }
}

struct Declaration {
    name: String,
    extras: Vec<String>,
    version: Option<String>,
}

fn parse_declaration(text: &str) -> Result<Declaration, String> {
    let Some(caps) = REQUIREMENT_RE.captures(text) else {
        return Err(format!(
            "expected 'package' or 'package==version', found '{}'",
            text
        ));
    };

    let name = caps["name"].to_string();

    let extras = match caps.name("extras") {
        Some(m) => {
            let extras: Vec<String> = m
                .as_str()
                .split(',')
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect();
            if let Some(bad) = extras.iter().find(|e| !EXTRA_RE.is_match(e)) {
                return Err(format!("invalid extra '{}' for package '{}'", bad, name));
            }
            extras
        }
        None => Vec::new(),
    };

    let version = match caps.name("op").map(|m| m.as_str()) {
        None => None,
        Some("==") => Some(
            caps.name("version")
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default(),
        ),
        Some(op) => {
            return Err(format!(
                "unsupported version operator '{}' for package '{}'; only exact '==' pins are allowed",
                op, name
            ))
        }
    };

    Ok(Declaration {
        name,
        extras,
        version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = "\
# Core LangChain Dependencies
crewai==0.28.8
langchain-google-genai==1.0.1

# PDF Processing
PyPDF2==3.0.1  # pure python
python-dotenv
";

    fn requirement(line: &ManifestLine) -> &Requirement {
        match line {
            ManifestLine::Requirement(req) => req,
            other => panic!("expected requirement, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_sections_and_pins() {
        let manifest = parse_manifest(MANIFEST);
        assert_eq!(manifest.lines.len(), 7);
        assert_eq!(
            manifest.lines[0],
            ManifestLine::Comment {
                text: "Core LangChain Dependencies".to_string()
            }
        );
        assert_eq!(manifest.lines[3], ManifestLine::Blank);

        let crewai = requirement(&manifest.lines[1]);
        assert_eq!(crewai.line, 2);
        assert_eq!(crewai.version.as_deref(), Some("0.28.8"));
        assert_eq!(crewai.section.as_deref(), Some("Core LangChain Dependencies"));

        let pypdf = requirement(&manifest.lines[5]);
        assert_eq!(pypdf.name, "PyPDF2");
        assert_eq!(pypdf.normalized_name, "pypdf2");
        assert_eq!(pypdf.version.as_deref(), Some("3.0.1"));
        assert_eq!(pypdf.raw, "PyPDF2==3.0.1  # pure python");

        let dotenv = requirement(&manifest.lines[6]);
        assert!(dotenv.version.is_none());
        assert_eq!(dotenv.section.as_deref(), Some("PDF Processing"));
    }

    #[test]
    fn test_blank_line_keeps_section() {
        let manifest = parse_manifest("# Optional: extras\n\n\nrequests\n");
        let req = manifest.requirements().next().unwrap();
        assert_eq!(req.section.as_deref(), Some("Optional: extras"));
    }

    #[test]
    fn test_whitespace_around_pin_and_extras() {
        let manifest = parse_manifest("uvicorn[standard, watch] == 0.29.0\n");
        let req = manifest.requirements().next().unwrap();
        assert_eq!(req.name, "uvicorn");
        assert_eq!(req.extras, vec!["standard", "watch"]);
        assert_eq!(req.version.as_deref(), Some("0.29.0"));
    }

    #[test]
    fn test_other_operators_are_invalid() {
        let manifest = parse_manifest("requests>=2.0\nnumpy~=1.26\n");
        assert_eq!(manifest.requirements().count(), 0);
        match &manifest.lines[0] {
            ManifestLine::Invalid { line, reason, .. } => {
                assert_eq!(*line, 1);
                assert!(reason.contains("'>='"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_garbage_is_invalid() {
        let manifest = parse_manifest("-e git+https://example.com/repo.git\n");
        assert!(matches!(manifest.lines[0], ManifestLine::Invalid { .. }));
    }

    #[test]
    fn test_empty_pin_is_kept_for_lint() {
        let manifest = parse_manifest("crewai==\n");
        let req = manifest.requirements().next().unwrap();
        assert_eq!(req.version.as_deref(), Some(""));
    }

    #[test]
    fn test_empty_inputs() {
        assert!(parse_manifest("").lines.is_empty());

        let manifest = parse_manifest("#\n");
        assert_eq!(
            manifest.lines,
            vec![ManifestLine::Comment {
                text: String::new()
            }]
        );
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Langchain_Google.GenAI"), "langchain-google-genai");
        assert_eq!(normalize_name("a__-b"), "a-b");
    }
}
