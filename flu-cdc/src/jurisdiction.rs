use chrono::NaiveDate;
use flu_utils::{
    dates::parse_iso_date,
    numeric::{normalize, RawValue},
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Jurisdiction code used by the hospital feed for national totals.
pub const NATIONAL_JURISDICTION: &str = "USA";

/// Stand-in code for records that arrive without a jurisdiction.
pub const UNKNOWN_JURISDICTION: &str = "UNK";

/// Week-ending date given to records whose date could not be parsed.
pub fn unknown_week_ending() -> NaiveDate {
    NaiveDate::default()
}

macro_rules! jurisdiction_metrics {
    ($($(#[$doc:meta])* $variant:ident => $field:ident),+ $(,)?) => {
        /// A numeric metric reported per jurisdiction-week by the CDC
        /// respiratory hospitalization feed (dataset `mpgq-jmmr`).
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum JurisdictionMetric {
            $($(#[$doc])* $variant,)+
        }

        impl JurisdictionMetric {
            /// Every metric, in feed column order.
            pub const ALL: &'static [JurisdictionMetric] = &[$(JurisdictionMetric::$variant,)+];

            /// The column name used by the CDC feed.
            pub fn field_name(self) -> &'static str {
                match self {
                    $(JurisdictionMetric::$variant => stringify!($field),)+
                }
            }

            pub fn from_field_name(name: &str) -> Option<JurisdictionMetric> {
                match name {
                    $(stringify!($field) => Some(JurisdictionMetric::$variant),)+
                    _ => None,
                }
            }
        }

        /// One jurisdiction-week as delivered by the hospital feed.
        ///
        /// Every metric is optional; the feed omits columns a jurisdiction
        /// did not report that week.
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct RawJurisdictionRecord {
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub weekendingdate: Option<String>,
            #[serde(default, skip_serializing_if = "Option::is_none")]
            pub jurisdiction: Option<String>,
            $(
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<RawValue>,
            )+
        }

        impl RawJurisdictionRecord {
            /// The raw value of `metric`, if the feed sent one.
            pub fn field(&self, metric: JurisdictionMetric) -> Option<&RawValue> {
                match metric {
                    $(JurisdictionMetric::$variant => self.$field.as_ref(),)+
                }
            }

            pub fn set_field(&mut self, metric: JurisdictionMetric, value: RawValue) {
                match metric {
                    $(JurisdictionMetric::$variant => self.$field = Some(value),)+
                }
            }
        }
    };
}

jurisdiction_metrics! {
    /// Total inpatient beds
    InpatientBeds => numinptbeds,
    InpatientBedsAdult => numinptbedsadult,
    InpatientBedsPediatric => numinptbedsped,
    InpatientBedsOccupied => numinptbedsocc,
    /// Fraction of inpatient beds occupied (0-1)
    PercentInpatientBedsOccupied => pctinptbedsocc,
    IcuBeds => numicubeds,
    IcuBedsOccupied => numicubedsocc,
    /// Fraction of ICU beds occupied (0-1)
    PercentIcuBedsOccupied => pcticubedsocc,
    FluPatientsAdult => numconffluhosppatsadult,
    FluPatientsPediatric => numconffluhosppatsped,
    /// Current hospitalized flu patients
    TotalFluPatients => totalconffluhosppats,
    PercentFluInpatientBeds => pctconffluinptbeds,
    FluIcuPatientsAdult => numconffluicupatsadult,
    FluIcuPatientsPediatric => numconffluicupatsped,
    TotalFluIcuPatients => totalconffluicupats,
    PercentFluIcuBeds => pctconffluicubeds,
    FluAdmissionsAge0To4 => numconfflunewadmped0to4,
    FluAdmissionsAge5To17 => numconfflunewadmped5to17,
    FluAdmissionsPediatric => totalconfflunewadmped,
    FluAdmissionsAge18To49 => numconfflunewadmadult18to49,
    FluAdmissionsAge50To64 => numconfflunewadmadult50to64,
    FluAdmissionsAge65To74 => numconfflunewadmadult65to74,
    FluAdmissionsAge75Plus => numconfflunewadmadult75plus,
    FluAdmissionsAdult => totalconfflunewadmadult,
    /// New flu admissions this week
    TotalFluAdmissions => totalconfflunewadm,
    FluAdmissionsPediatricPer100k => totalconfflunewadmpedper100k,
    FluAdmissionsAdultPer100k => totalconfflunewadmadultper100k,
    /// New flu admissions per 100,000 population
    FluAdmissionsPer100k => totalconfflunewadmper100k,
    HospitalsReportingBeds => numinptbedshosprep,
    HospitalsReportingFluPatients => totalconffluhosppatshosprep,
    HospitalsReportingFluAdmissions => totalconfflunewadmhosprep,
    CovidPatients => totalconfc19hosppats,
    CovidAdmissions => totalconfc19newadm,
    RsvPatients => totalconfrsvhosppats,
    RsvAdmissions => totalconfrsvnewadm,
}

/// Flu admission age brackets, youngest first, with their display labels.
pub const AGE_GROUPS: [(&str, JurisdictionMetric); 6] = [
    ("0-4", JurisdictionMetric::FluAdmissionsAge0To4),
    ("5-17", JurisdictionMetric::FluAdmissionsAge5To17),
    ("18-49", JurisdictionMetric::FluAdmissionsAge18To49),
    ("50-64", JurisdictionMetric::FluAdmissionsAge50To64),
    ("65-74", JurisdictionMetric::FluAdmissionsAge65To74),
    ("75+", JurisdictionMetric::FluAdmissionsAge75Plus),
];

/// A jurisdiction-week with a typed date and every metric present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedJurisdictionRecord {
    pub jurisdiction: String,
    pub week_ending: NaiveDate,
    pub metrics: BTreeMap<JurisdictionMetric, f64>,
}

impl NormalizedJurisdictionRecord {
    /// Normalize a raw record. Never fails: missing metrics become 0, a
    /// blank jurisdiction becomes [`UNKNOWN_JURISDICTION`] and an unparsable
    /// date becomes [`unknown_week_ending`].
    pub fn from_raw(raw: &RawJurisdictionRecord) -> Self {
        let jurisdiction = raw
            .jurisdiction
            .as_deref()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| UNKNOWN_JURISDICTION.to_string());
        let week_ending = raw
            .weekendingdate
            .as_deref()
            .and_then(|s| parse_iso_date(s).ok())
            .unwrap_or_else(unknown_week_ending);
        let metrics = JurisdictionMetric::ALL
            .iter()
            .map(|&metric| (metric, normalize(raw.field(metric))))
            .collect();
        NormalizedJurisdictionRecord {
            jurisdiction,
            week_ending,
            metrics,
        }
    }

    pub fn value(&self, metric: JurisdictionMetric) -> f64 {
        self.metrics.get(&metric).copied().unwrap_or(0.0)
    }

    pub fn is_national(&self) -> bool {
        self.jurisdiction == NATIONAL_JURISDICTION
    }

    /// False when the week-ending date is the stand-in for an unparsable date.
    pub fn has_known_week_ending(&self) -> bool {
        self.week_ending != unknown_week_ending()
    }
}

/// Normalize every hospital record. No record is dropped.
pub fn process_jurisdiction_records(
    raw: &[RawJurisdictionRecord],
) -> Vec<NormalizedJurisdictionRecord> {
    let records: Vec<NormalizedJurisdictionRecord> = raw
        .iter()
        .map(|record| {
            let normalized = NormalizedJurisdictionRecord::from_raw(record);
            if !normalized.has_known_week_ending() {
                warn!(
                    "Unparsable week ending date {:?} for {}; using {}",
                    record.weekendingdate, normalized.jurisdiction, normalized.week_ending
                );
            }
            normalized
        })
        .collect();
    debug!("Processed {} jurisdiction records", records.len());
    records
}

/// Decode a hospital feed payload (a JSON array of records).
pub fn parse_jurisdiction_payload(json: &str) -> anyhow::Result<Vec<RawJurisdictionRecord>> {
    Ok(serde_json::from_str(json)?)
}
