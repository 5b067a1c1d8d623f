//! Record types for the public respiratory surveillance feeds and the
//! processing boundary that turns them into normalized records.
//!
//! Nothing outside this crate reads a raw feed field: downstream crates only
//! ever see [`jurisdiction::NormalizedJurisdictionRecord`],
//! [`wastewater::NormalizedWastewaterRecord`] and
//! [`nextstrain::NextstrainSummary`].

#[cfg(feature = "api")]
pub mod api;
pub mod jurisdiction;
pub mod nextstrain;
pub mod wastewater;

pub use flu_utils::numeric::RawValue;
