//! Receipt records and amount parsing.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

static AMOUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?\d[\d,]*(?:\.\d+)?").expect("valid amount regex"));

/// One receipt as extracted by the extraction agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptRecord {
    #[serde(default)]
    pub company_name: String,
    /// Amount text as written by the model; numbers are kept as their text.
    #[serde(default, deserialize_with = "amount_text")]
    pub total_amount: String,
}

impl ReceiptRecord {
    pub fn new(company_name: impl Into<String>, total_amount: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            total_amount: total_amount.into(),
        }
    }

    /// The parsed total amount.
    pub fn amount(&self) -> f64 {
        parse_amount(&self.total_amount)
    }
}

/// Parse a receipt amount into a number.
///
/// Currency symbols, letters, whitespace and thousands separators are
/// ignored. A single comma followed by exactly two digits, with no dot, is
/// a decimal comma (`12,50` is 12.5). Empty or unparseable text is 0.0.
pub fn parse_amount(text: &str) -> f64 {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let Some(m) = AMOUNT_RE.find(&compact) else {
        return 0.0;
    };
    let number = m.as_str();

    let normalized = match number.split_once(',') {
        Some((_, frac))
            if !number.contains('.')
                && number.matches(',').count() == 1
                && frac.len() == 2 =>
        {
            number.replacen(',', ".", 1)
        }
        _ => number.replace(',', ""),
    };

    match normalized.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

/// Accept a string, a number or null for `total_amount`.
fn amount_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(de::Error::custom(format!(
            "expected an amount as a string or number, found {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount_plain_and_symbols() {
        assert_eq!(parse_amount("42.10"), 42.10);
        assert_eq!(parse_amount("$1,234.56"), 1234.56);
        assert_eq!(parse_amount("₹ 450"), 450.0);
        assert_eq!(parse_amount("Rs.100"), 100.0);
        assert_eq!(parse_amount("USD 1 200.00"), 1200.0);
        assert_eq!(parse_amount("-3.5"), -3.5);
    }

    #[test]
    fn test_parse_amount_decimal_comma() {
        assert_eq!(parse_amount("12,50"), 12.5);
        assert_eq!(parse_amount("€ 7,99"), 7.99);
        assert_eq!(parse_amount("1,234"), 1234.0);
        assert_eq!(parse_amount("1,234,56"), 123456.0);
    }

    #[test]
    fn test_parse_amount_empty_or_invalid() {
        assert_eq!(parse_amount(""), 0.0);
        assert_eq!(parse_amount("N/A"), 0.0);
        assert_eq!(parse_amount("   "), 0.0);
    }

    #[test]
    fn test_record_accepts_numeric_amount() {
        let records: Vec<ReceiptRecord> = serde_json::from_str(
            r#"[{"company_name": "Cafe", "total_amount": 4.5},
                {"company_name": "Shop", "total_amount": "$10"},
                {"company_name": "Kiosk", "total_amount": null},
                {"company_name": "Bare"}]"#,
        )
        .unwrap();
        assert_eq!(records[0].total_amount, "4.5");
        assert_eq!(records[1].amount(), 10.0);
        assert_eq!(records[2].amount(), 0.0);
        assert_eq!(records[3].total_amount, "");
    }
}
