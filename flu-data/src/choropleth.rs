//! Per-jurisdiction values and fills for the state map.

use crate::{
    aggregate::{aggregate_by_state, latest_by_week, national_average},
    severity::{classify, MetricType, SeverityBand},
};
use flu_cdc::{
    jurisdiction::{JurisdictionMetric, NormalizedJurisdictionRecord, NATIONAL_JURISDICTION},
    wastewater::{process_wastewater_records, NormalizedWastewaterRecord, RawWastewaterRecord},
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// The hospital metric shown on the map for `metric`, if it is a hospital metric.
pub fn hospital_metric(metric: MetricType) -> Option<JurisdictionMetric> {
    match metric {
        MetricType::Per100k => Some(JurisdictionMetric::FluAdmissionsPer100k),
        MetricType::Admissions => Some(JurisdictionMetric::TotalFluAdmissions),
        MetricType::Patients => Some(JurisdictionMetric::TotalFluPatients),
        MetricType::Wastewater => None,
    }
}

/// Latest-week value of `metric` for every state-level jurisdiction.
///
/// The national total is left out.
pub fn map_values(
    records: &[NormalizedJurisdictionRecord],
    metric: JurisdictionMetric,
) -> BTreeMap<String, f64> {
    latest_by_week(records)
        .into_iter()
        .filter(|(jurisdiction, _)| jurisdiction != NATIONAL_JURISDICTION)
        .map(|(jurisdiction, record)| {
            let value = record.value(metric);
            (jurisdiction, value)
        })
        .collect()
}

/// Average viral concentration per jurisdiction.
pub fn wastewater_map_values(records: &[NormalizedWastewaterRecord]) -> BTreeMap<String, f64> {
    aggregate_by_state(records)
        .into_iter()
        .map(|(jurisdiction, aggregate)| (jurisdiction, aggregate.average_concentration))
        .collect()
}

/// A jurisdiction's value with its severity band.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapFill {
    pub jurisdiction: String,
    pub value: f64,
    #[serde(flatten)]
    pub band: SeverityBand,
}

/// Classify every value with the table of `metric`.
pub fn map_fills(values: &BTreeMap<String, f64>, metric: MetricType) -> Vec<MapFill> {
    values
        .iter()
        .map(|(jurisdiction, &value)| MapFill {
            jurisdiction: jurisdiction.clone(),
            value,
            band: classify(value, metric),
        })
        .collect()
}

/// Headline numbers for the wastewater panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WastewaterOverview {
    /// Samples kept after processing
    pub sample_count: usize,
    pub national_average: f64,
    /// Distinct sewersheds in the raw payload
    pub detection_sites: usize,
    /// Distinct jurisdictions in the raw payload
    pub states_monitored: usize,
}

impl WastewaterOverview {
    pub fn from_raw(raw: &[RawWastewaterRecord]) -> Self {
        let processed = process_wastewater_records(raw);
        let distinct = |values: Vec<Option<String>>| -> usize {
            values.into_iter().flatten().collect::<BTreeSet<String>>().len()
        };
        let clean = |value: Option<&String>| {
            value
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
        };
        WastewaterOverview {
            sample_count: processed.len(),
            national_average: national_average(&processed),
            detection_sites: distinct(raw.iter().map(|r| clean(r.sewershed_id.as_ref())).collect()),
            states_monitored: distinct(
                raw.iter()
                    .map(|r| clean(r.wwtp_jurisdiction.as_ref()))
                    .collect(),
            ),
        }
    }
}
