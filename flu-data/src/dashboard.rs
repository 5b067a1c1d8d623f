//! Headline metrics for the national series.

use crate::{
    aggregate::{dominant_category, percentage, DominantCategory},
    trend::{trend_direction, week_over_week_change, ChangeDirection},
};
use chrono::NaiveDate;
use flu_cdc::jurisdiction::{JurisdictionMetric, NormalizedJurisdictionRecord, AGE_GROUPS};
use log::debug;
use serde::Serialize;

/// A week-over-week change and its direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeeklyChange {
    pub value: f64,
    pub direction: ChangeDirection,
}

impl WeeklyChange {
    fn between(current: f64, previous: f64, threshold: f64) -> Self {
        let value = week_over_week_change(current, previous);
        WeeklyChange {
            value,
            direction: trend_direction(value, threshold),
        }
    }
}

/// Current patients for flu and the comparator viruses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VirusComparison {
    pub flu: f64,
    pub covid: f64,
    pub rsv: f64,
    /// Flu's share of the three, in percent
    pub flu_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardMetrics {
    pub week_ending: NaiveDate,
    pub total_patients: f64,
    pub patients_change: WeeklyChange,
    pub new_admissions: f64,
    pub admissions_change: WeeklyChange,
    pub icu_patients: f64,
    /// ICU occupancy, in percent
    pub icu_occupancy: f64,
    /// Inpatient bed occupancy, in percent
    pub bed_utilization: f64,
    pub dominant_age_group: DominantCategory,
    pub virus_comparison: VirusComparison,
}

/// Compare the latest national week with the one before it.
///
/// Records for other jurisdictions are ignored. With a single week the
/// changes are 0. Returns `None` when there is no national record.
pub fn dashboard_metrics(
    records: &[NormalizedJurisdictionRecord],
    trend_threshold: f64,
) -> Option<DashboardMetrics> {
    let mut national: Vec<&NormalizedJurisdictionRecord> =
        records.iter().filter(|r| r.is_national()).collect();
    national.sort_by(|a, b| a.week_ending.cmp(&b.week_ending));

    let Some(&latest) = national.last() else {
        debug!("No national records among {} hospital records", records.len());
        return None;
    };
    let previous = national
        .len()
        .checked_sub(2)
        .map(|i| national[i])
        .unwrap_or(latest);

    let total_patients = latest.value(JurisdictionMetric::TotalFluPatients);
    let new_admissions = latest.value(JurisdictionMetric::TotalFluAdmissions);

    let age_groups: Vec<(&str, f64)> = AGE_GROUPS
        .iter()
        .map(|&(label, metric)| (label, latest.value(metric)))
        .collect();

    let covid = latest.value(JurisdictionMetric::CovidPatients);
    let rsv = latest.value(JurisdictionMetric::RsvPatients);

    Some(DashboardMetrics {
        week_ending: latest.week_ending,
        total_patients,
        patients_change: WeeklyChange::between(
            total_patients,
            previous.value(JurisdictionMetric::TotalFluPatients),
            trend_threshold,
        ),
        new_admissions,
        admissions_change: WeeklyChange::between(
            new_admissions,
            previous.value(JurisdictionMetric::TotalFluAdmissions),
            trend_threshold,
        ),
        icu_patients: latest.value(JurisdictionMetric::TotalFluIcuPatients),
        icu_occupancy: latest.value(JurisdictionMetric::PercentIcuBedsOccupied) * 100.0,
        bed_utilization: latest.value(JurisdictionMetric::PercentInpatientBedsOccupied) * 100.0,
        dominant_age_group: dominant_category(&age_groups),
        virus_comparison: VirusComparison {
            flu: total_patients,
            covid,
            rsv,
            flu_percentage: percentage(total_patients, total_patients + covid + rsv),
        },
    })
}
