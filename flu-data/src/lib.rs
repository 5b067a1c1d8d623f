//! Analytics over normalized flu surveillance records.
//!
//! This crate turns the records produced by `flu-cdc` into the numbers a
//! dashboard shows: per-jurisdiction rollups, trend statistics, severity
//! tiers and map fills. Everything here is synchronous and pure.
//!
//! ```
//! use flu_cdc::wastewater::{parse_wastewater_payload, process_wastewater_records};
//! use flu_data::{aggregate::national_average, severity::{classify, MetricType, SeverityTier}};
//!
//! let raw = parse_wastewater_payload(
//!     r#"[{"wwtp_jurisdiction": "ca", "sample_collect_date": "2024-01-10", "pcr_target_avg_conc": "2500"},
//!         {"wwtp_jurisdiction": "ca", "pcr_target_avg_conc": "99"}]"#,
//! ).unwrap();
//! let records = process_wastewater_records(&raw);
//! assert_eq!(records.len(), 1);
//!
//! let average = national_average(&records);
//! assert_eq!(classify(average, MetricType::Wastewater).tier, SeverityTier::Moderate);
//! ```

pub mod aggregate;
pub mod choropleth;
pub mod dashboard;
pub mod severity;
pub mod trend;
