//! Receipt processing: records, per-company aggregation, the two-agent
//! crew and the report read back from its output files.

pub mod aggregate;
pub mod crew;
pub mod model;
pub mod report;

pub use aggregate::{aggregate, CompanyTotals};
pub use crew::{troubleshooting, ReceiptProcessingCrew};
pub use model::{parse_amount, ReceiptRecord};
pub use report::{ProcessingReport, TotalsSource};
