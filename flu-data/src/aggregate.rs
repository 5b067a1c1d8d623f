//! Per-key rollups over normalized records.
//!
//! Every function here is a pure view over its input: nothing is cached or
//! updated incrementally, and empty input always yields a neutral value.

use chrono::NaiveDate;
use flu_cdc::{
    jurisdiction::NormalizedJurisdictionRecord,
    wastewater::{sort_by_date, NormalizedWastewaterRecord, SortOrder},
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// Arithmetic mean, 0 for an empty slice.
pub fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    sum(values) / values.len() as f64
}

pub fn sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

/// `part` as a percentage of `whole`, 0 when `whole` is 0.
pub fn percentage(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    part / whole * 100.0
}

/// The most recent sample for each jurisdiction.
///
/// When two samples share the latest date, the first one in `records` wins.
pub fn latest_by_jurisdiction(
    records: &[NormalizedWastewaterRecord],
) -> BTreeMap<String, NormalizedWastewaterRecord> {
    let mut latest: BTreeMap<String, NormalizedWastewaterRecord> = BTreeMap::new();
    for record in records {
        match latest.get_mut(&record.jurisdiction) {
            Some(current) if record.collection_date > current.collection_date => {
                *current = record.clone();
            }
            Some(_) => {}
            None => {
                latest.insert(record.jurisdiction.clone(), record.clone());
            }
        }
    }
    latest
}

/// Mean viral concentration over every sample, 0 when there are none.
pub fn national_average(records: &[NormalizedWastewaterRecord]) -> f64 {
    let concentrations: Vec<f64> = records.iter().map(|r| r.viral_concentration).collect();
    average(&concentrations)
}

/// Result of [`dominant_category`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DominantCategory {
    Category(String),
    NoData,
}

impl DominantCategory {
    pub fn label(&self) -> Option<&str> {
        match self {
            DominantCategory::Category(label) => Some(label.as_str()),
            DominantCategory::NoData => None,
        }
    }
}

impl fmt::Display for DominantCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DominantCategory::Category(label) => write!(f, "{}", label),
            DominantCategory::NoData => write!(f, "No data"),
        }
    }
}

/// The label with the greatest value.
///
/// Categories are considered in slice order and only a strictly greater
/// value replaces the current leader, so ties go to the earliest entry.
/// Non-finite values are ignored.
pub fn dominant_category<S: AsRef<str>>(categories: &[(S, f64)]) -> DominantCategory {
    let mut best: Option<(&str, f64)> = None;
    for (label, value) in categories {
        if !value.is_finite() {
            continue;
        }
        match best {
            Some((_, leader)) if *value <= leader => {}
            _ => best = Some((label.as_ref(), *value)),
        }
    }
    match best {
        Some((label, _)) => DominantCategory::Category(label.to_string()),
        None => DominantCategory::NoData,
    }
}

/// Each category's share of the total, as a percentage.
///
/// Output keeps input order. A zero total gives every category 0.
pub fn proportions<S: AsRef<str>>(categories: &[(S, f64)]) -> Vec<(String, f64)> {
    let total: f64 = categories.iter().map(|(_, value)| value).sum();
    categories
        .iter()
        .map(|(label, value)| (label.as_ref().to_string(), percentage(*value, total)))
        .collect()
}

/// Wastewater rollup for one jurisdiction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateAggregate {
    pub jurisdiction: String,
    pub average_concentration: f64,
    pub sample_count: usize,
    pub latest_date: NaiveDate,
}

/// Average concentration, sample count and latest date per jurisdiction.
pub fn aggregate_by_state(
    records: &[NormalizedWastewaterRecord],
) -> BTreeMap<String, StateAggregate> {
    let mut totals: BTreeMap<&str, (f64, usize, NaiveDate)> = BTreeMap::new();
    for record in records {
        let entry = totals
            .entry(record.jurisdiction.as_str())
            .or_insert((0.0, 0, record.collection_date));
        entry.0 += record.viral_concentration;
        entry.1 += 1;
        if record.collection_date > entry.2 {
            entry.2 = record.collection_date;
        }
    }

    totals
        .into_iter()
        .map(|(jurisdiction, (total, count, latest_date))| {
            (
                jurisdiction.to_string(),
                StateAggregate {
                    jurisdiction: jurisdiction.to_string(),
                    average_concentration: total / count as f64,
                    sample_count: count,
                    latest_date,
                },
            )
        })
        .collect()
}

/// Samples for one jurisdiction, oldest first, keeping only the last `limit`.
pub fn state_time_series(
    records: &[NormalizedWastewaterRecord],
    jurisdiction: &str,
    limit: usize,
) -> Vec<NormalizedWastewaterRecord> {
    let mut series: Vec<NormalizedWastewaterRecord> = records
        .iter()
        .filter(|r| r.jurisdiction.eq_ignore_ascii_case(jurisdiction))
        .cloned()
        .collect();
    sort_by_date(&mut series, SortOrder::Ascending);
    let skip = series.len().saturating_sub(limit);
    series.split_off(skip)
}

/// The hospital record with the latest week-ending date per jurisdiction.
pub fn latest_by_week(
    records: &[NormalizedJurisdictionRecord],
) -> BTreeMap<String, NormalizedJurisdictionRecord> {
    let mut latest: BTreeMap<String, NormalizedJurisdictionRecord> = BTreeMap::new();
    for record in records {
        match latest.get_mut(&record.jurisdiction) {
            Some(current) if record.week_ending > current.week_ending => {
                *current = record.clone();
            }
            Some(_) => {}
            None => {
                latest.insert(record.jurisdiction.clone(), record.clone());
            }
        }
    }
    latest
}

/// Records ordered oldest week first, keeping only the last `weeks`.
pub fn recent_weeks(
    records: &[NormalizedJurisdictionRecord],
    weeks: usize,
) -> Vec<NormalizedJurisdictionRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| a.week_ending.cmp(&b.week_ending));
    let skip = sorted.len().saturating_sub(weeks);
    sorted.split_off(skip)
}
