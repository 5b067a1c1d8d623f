use chrono::NaiveDate;
use flu_utils::{
    dates::parse_iso_date,
    numeric::{normalize, RawValue},
};
use log::debug;
use serde::{Deserialize, Serialize};

/// One sample from the NWSS wastewater feed (dataset `ymmh-divb`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawWastewaterRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sewershed_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wwtp_jurisdiction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_collect_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pcr_target: Option<String>,
    /// Average target concentration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pcr_target_avg_conc: Option<RawValue>,
    /// Average target concentration on a linear scale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pcr_target_avg_conc_lin: Option<RawValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pcr_target_units: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counties_served: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population_served: Option<RawValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county_fips: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_updated: Option<String>,
}

/// A validated wastewater sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedWastewaterRecord {
    /// Uppercased jurisdiction code
    pub jurisdiction: String,
    pub collection_date: NaiveDate,
    /// Viral concentration, never negative
    pub viral_concentration: f64,
    pub county: Option<String>,
    pub population_served: Option<u64>,
    pub sewershed_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Ascending,
    Descending,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

impl NormalizedWastewaterRecord {
    /// Validate and normalize a raw sample.
    ///
    /// Returns `None` when the jurisdiction, the collection date or a
    /// readable concentration is missing. The linear-scale concentration is
    /// preferred when it can be read; otherwise the primary field is used.
    pub fn from_raw(raw: &RawWastewaterRecord) -> Option<Self> {
        let jurisdiction = non_blank(raw.wwtp_jurisdiction.as_deref())?.to_uppercase();
        let collection_date = parse_iso_date(non_blank(raw.sample_collect_date.as_deref())?).ok()?;
        let concentration = [
            raw.pcr_target_avg_conc_lin.as_ref(),
            raw.pcr_target_avg_conc.as_ref(),
        ]
        .into_iter()
        .flatten()
        .find(|value| value.to_number().is_some())?;
        let population_served = raw
            .population_served
            .as_ref()
            .filter(|value| !value.is_blank())
            .map(|value| normalize(Some(value)).round().max(0.0) as u64);
        Some(NormalizedWastewaterRecord {
            jurisdiction,
            collection_date,
            viral_concentration: normalize(Some(concentration)).max(0.0),
            county: non_blank(raw.counties_served.as_deref()).map(str::to_string),
            population_served,
            sewershed_id: non_blank(raw.sewershed_id.as_deref()).map(str::to_string),
        })
    }
}

/// Drop incomplete samples, normalize the rest and sort newest first.
pub fn process_wastewater_records(raw: &[RawWastewaterRecord]) -> Vec<NormalizedWastewaterRecord> {
    let mut records: Vec<NormalizedWastewaterRecord> = raw
        .iter()
        .filter_map(NormalizedWastewaterRecord::from_raw)
        .collect();
    sort_by_date(&mut records, SortOrder::Descending);
    debug!(
        "Processed {} wastewater records, dropped {} incomplete",
        records.len(),
        raw.len() - records.len()
    );
    records
}

/// Stable sort by collection date.
pub fn sort_by_date(records: &mut [NormalizedWastewaterRecord], order: SortOrder) {
    match order {
        SortOrder::Ascending => records.sort_by(|a, b| a.collection_date.cmp(&b.collection_date)),
        SortOrder::Descending => records.sort_by(|a, b| b.collection_date.cmp(&a.collection_date)),
    }
}

/// Decode a wastewater feed payload (a JSON array of samples).
pub fn parse_wastewater_payload(json: &str) -> anyhow::Result<Vec<RawWastewaterRecord>> {
    Ok(serde_json::from_str(json)?)
}
