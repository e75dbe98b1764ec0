//! Reading back the crew's JSON files and summarizing spending.
//!
//! The aggregated file is trusted when it parses; otherwise totals are
//! recomputed from the extracted receipts.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use super::aggregate::{aggregate, CompanyTotals};
use super::model::ReceiptRecord;
use crate::utilities::config::ReceiptConfig;
use crate::utilities::printer::rule;

/// Where the reported totals came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalsSource {
    /// Read from the aggregation agent's output file.
    AggregatedFile,
    /// Recomputed from the extracted receipts.
    LocalAggregation,
    /// Neither file held usable data.
    Unavailable,
}

/// Outcome of a processing run as recorded on disk.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingReport {
    pub extracted_path: PathBuf,
    pub aggregated_path: PathBuf,
    /// Raw content of the extracted file, when it parsed as JSON.
    pub extracted: Option<Value>,
    /// Receipts recovered from the extracted file.
    pub records: Vec<ReceiptRecord>,
    pub totals: CompanyTotals,
    pub source: TotalsSource,
    /// Problems found while reading the files.
    pub warnings: Vec<String>,
}

impl ProcessingReport {
    /// Read both output files from `dir`, named as in `config`.
    pub fn load(dir: &Path, config: &ReceiptConfig) -> Self {
        let extracted_path = dir.join(&config.extracted_file);
        let aggregated_path = dir.join(&config.aggregated_file);
        let mut warnings = Vec::new();

        let extracted = read_json(&extracted_path, &mut warnings);
        let records = extracted
            .as_ref()
            .map(|value| records_from(value, &mut warnings))
            .unwrap_or_default();

        let aggregated = read_json(&aggregated_path, &mut warnings).and_then(|value| {
            match serde_json::from_value::<CompanyTotals>(value) {
                Ok(totals) => Some(totals),
                Err(e) => {
                    warnings.push(format!("{}: not a company totals object: {}", aggregated_path.display(), e));
                    None
                }
            }
        });

        let (totals, source) = match aggregated {
            Some(totals) => (totals, TotalsSource::AggregatedFile),
            None if !records.is_empty() => {
                log::info!("Falling back to local aggregation of {} receipt(s)", records.len());
                (aggregate(&records), TotalsSource::LocalAggregation)
            }
            None => (CompanyTotals::new(), TotalsSource::Unavailable),
        };

        Self {
            extracted_path,
            aggregated_path,
            extracted,
            records,
            totals,
            source,
            warnings,
        }
    }

    /// Sum of all company totals.
    pub fn total_spending(&self) -> f64 {
        self.totals.total()
    }

    /// Pretty-printed extracted data, if any.
    pub fn render_extracted(&self) -> Option<String> {
        self.extracted
            .as_ref()
            .and_then(|value| serde_json::to_string_pretty(value).ok())
    }

    /// Pretty-printed company totals.
    pub fn render_totals(&self) -> String {
        serde_json::to_string_pretty(&self.totals).unwrap_or_else(|_| "{}".to_string())
    }

    /// Spending lines per company followed by the grand total.
    pub fn render_summary(&self) -> String {
        let separator = rule('-', 30);
        let mut lines = vec!["SPENDING SUMMARY:".to_string(), separator.clone()];
        for (company, amount) in self.totals.iter() {
            lines.push(format!("{}: ${:.2}", company, amount));
        }
        lines.push(separator);
        lines.push(format!("Total Spending: ${:.2}", self.total_spending()));
        lines.join("\n")
    }
}

fn read_json(path: &Path, warnings: &mut Vec<String>) -> Option<Value> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warnings.push(format!("{} not readable: {}", path.display(), e));
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warnings.push(format!("{} is not valid JSON: {}", path.display(), e));
            None
        }
    }
}

/// Pull receipt records out of the extracted file.
///
/// Accepts a list of records, or an object wrapping exactly one such list.
/// Entries that are not records are skipped with a warning.
fn records_from(value: &Value, warnings: &mut Vec<String>) -> Vec<ReceiptRecord> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => {
            let mut lists = map.values().filter_map(Value::as_array);
            match (lists.next(), lists.next()) {
                (Some(items), None) => items,
                _ => {
                    warnings.push("extracted data is not a list of receipts".to_string());
                    return Vec::new();
                }
            }
        }
        _ => {
            warnings.push("extracted data is not a list of receipts".to_string());
            return Vec::new();
        }
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| match record_from(item) {
            Ok(record) => Some(record),
            Err(e) => {
                warnings.push(format!("skipping extracted entry {}: {}", idx, e));
                None
            }
        })
        .collect()
}

fn record_from(value: &Value) -> Result<ReceiptRecord, serde_json::Error> {
    if !value.is_object() {
        return Err(serde::de::Error::custom("expected an object"));
    }
    serde_json::from_value(value.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &Path) -> ReceiptConfig {
        ReceiptConfig {
            working_dir: dir.to_path_buf(),
            ..ReceiptConfig::default()
        }
    }

    #[test]
    fn test_uses_aggregated_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("extracted_receipts.json"),
            r#"[{"company_name": "Cafe", "total_amount": "4.50"}]"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("aggregated_receipts.json"),
            r#"{"Cafe": 4.5, "Shop": 10}"#,
        )
        .unwrap();

        let report = ProcessingReport::load(dir.path(), &config_in(dir.path()));
        assert_eq!(report.source, TotalsSource::AggregatedFile);
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.total_spending(), 14.5);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_falls_back_to_local_aggregation() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("extracted_receipts.json"),
            r#"[{"company_name": "Cafe", "total_amount": "4.50"},
                {"company_name": "Cafe", "total_amount": "$1.25"},
                "garbage"]"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("aggregated_receipts.json"), "not json").unwrap();

        let report = ProcessingReport::load(dir.path(), &config_in(dir.path()));
        assert_eq!(report.source, TotalsSource::LocalAggregation);
        assert_eq!(report.totals.get("Cafe"), Some(5.75));
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn test_wrapped_receipt_list() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("extracted_receipts.json"),
            r#"{"receipts": [{"company_name": "Shop", "total_amount": 3}]}"#,
        )
        .unwrap();

        let report = ProcessingReport::load(dir.path(), &config_in(dir.path()));
        assert_eq!(report.source, TotalsSource::LocalAggregation);
        assert_eq!(report.total_spending(), 3.0);
    }

    #[test]
    fn test_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let report = ProcessingReport::load(dir.path(), &config_in(dir.path()));
        assert_eq!(report.source, TotalsSource::Unavailable);
        assert_eq!(report.warnings.len(), 2);
        assert!(report.render_extracted().is_none());
        assert!(report.render_summary().ends_with("Total Spending: $0.00"));
    }

    #[test]
    fn test_render_summary() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("aggregated_receipts.json"),
            r#"{"Shop": 10, "Cafe": 4.25}"#,
        )
        .unwrap();

        let report = ProcessingReport::load(dir.path(), &config_in(dir.path()));
        let summary = report.render_summary();
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines[0], "SPENDING SUMMARY:");
        assert_eq!(lines[2], "Shop: $10.00");
        assert_eq!(lines[3], "Cafe: $4.25");
        assert_eq!(lines.last().copied(), Some("Total Spending: $14.25"));
    }
}
