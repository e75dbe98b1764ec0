//! Spending totals per company.

use std::fmt;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::{parse_amount, ReceiptRecord};

/// Company name to total spent, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyTotals {
    entries: Vec<(String, f64)>,
}

impl CompanyTotals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` to `company`, appending the company if it is new.
    pub fn add(&mut self, company: &str, amount: f64) {
        match self.entries.iter_mut().find(|(name, _)| name == company) {
            Some((_, total)) => *total += amount,
            None => self.entries.push((company.to_string(), amount)),
        }
    }

    pub fn get(&self, company: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(name, _)| name == company)
            .map(|(_, total)| *total)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(name, total)| (name.as_str(), *total))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum over all companies.
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, total)| total).sum()
    }
}

/// Group receipts by exact company name and sum their amounts.
pub fn aggregate(records: &[ReceiptRecord]) -> CompanyTotals {
    let mut totals = CompanyTotals::new();
    for record in records {
        totals.add(&record.company_name, record.amount());
    }
    totals
}

impl Serialize for CompanyTotals {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, total) in &self.entries {
            map.serialize_entry(name, total)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CompanyTotals {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TotalsVisitor;

        impl<'de> Visitor<'de> for TotalsVisitor {
            type Value = CompanyTotals;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping company names to amounts")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<CompanyTotals, A::Error> {
                let mut totals = CompanyTotals::new();
                while let Some((name, value)) = access.next_entry::<String, Value>()? {
                    let amount = match &value {
                        Value::Number(n) => n.as_f64().unwrap_or(0.0),
                        Value::String(s) => parse_amount(s),
                        Value::Null => 0.0,
                        other => {
                            return Err(de::Error::custom(format!(
                                "amount for '{}' is not a number: {}",
                                name, other
                            )))
                        }
                    };
                    totals.add(&name, amount);
                }
                Ok(totals)
            }
        }

        deserializer.deserialize_map(TotalsVisitor)
    }
}
