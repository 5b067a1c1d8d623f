//! Severity tiers and colors for map fills and legends.
//!
//! Each metric type owns one ascending threshold table. Both [`classify`]
//! and [`legend`] read from that table, so the two always agree.

use flu_utils::format::format_fixed;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Fill color for values with no data.
pub const NO_DATA_COLOR: &str = "#f3f4f6";

/// Which threshold table applies to a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    /// New admissions per 100,000 population
    Per100k,
    /// New admissions
    Admissions,
    /// Current hospitalized patients
    Patients,
    /// Wastewater viral concentration
    Wastewater,
}

impl MetricType {
    pub const ALL: [MetricType; 4] = [
        MetricType::Per100k,
        MetricType::Admissions,
        MetricType::Patients,
        MetricType::Wastewater,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            MetricType::Per100k => "per100k",
            MetricType::Admissions => "admissions",
            MetricType::Patients => "patients",
            MetricType::Wastewater => "wastewater",
        }
    }

    fn table(self) -> &'static ThresholdTable {
        match self {
            MetricType::Per100k => &PER_100K,
            MetricType::Admissions => &ADMISSIONS,
            MetricType::Patients => &PATIENTS,
            MetricType::Wastewater => &WASTEWATER,
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMetricType(pub String);

impl fmt::Display for UnknownMetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unknown metric type {:?}: expected per100k, admissions, patients or wastewater",
            self.0
        )
    }
}

impl std::error::Error for UnknownMetricType {}

impl FromStr for MetricType {
    type Err = UnknownMetricType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        MetricType::ALL
            .into_iter()
            .find(|metric| metric.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownMetricType(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeverityTier {
    NoData,
    Minimal,
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl SeverityTier {
    pub const fn label(self) -> &'static str {
        match self {
            SeverityTier::NoData => "No Data",
            SeverityTier::Minimal => "Minimal",
            SeverityTier::Low => "Low",
            SeverityTier::Moderate => "Moderate",
            SeverityTier::High => "High",
            SeverityTier::VeryHigh => "Very High",
        }
    }
}

impl fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Classification of one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeverityBand {
    pub tier: SeverityTier,
    pub color: &'static str,
    pub label: &'static str,
}

impl SeverityBand {
    pub const NO_DATA: SeverityBand = SeverityBand {
        tier: SeverityTier::NoData,
        color: NO_DATA_COLOR,
        label: "No Data",
    };
}

/// One row of a legend, most severe first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegendEntry {
    pub tier: SeverityTier,
    pub color: &'static str,
    pub label: String,
}

struct Threshold {
    tier: SeverityTier,
    /// Inclusive lower bound; the first step covers everything above 0
    lower: f64,
    color: &'static str,
}

struct ThresholdTable {
    /// Ascending, never empty
    steps: &'static [Threshold],
    /// Decimal places shown in legend ranges
    decimals: usize,
}

const fn step(tier: SeverityTier, lower: f64, color: &'static str) -> Threshold {
    Threshold { tier, lower, color }
}

static PER_100K: ThresholdTable = ThresholdTable {
    steps: &[
        step(SeverityTier::Low, 0.0, "#10b981"),
        step(SeverityTier::Moderate, 1.0, "#fbbf24"),
        step(SeverityTier::High, 3.0, "#f97316"),
        step(SeverityTier::VeryHigh, 6.0, "#dc2626"),
    ],
    decimals: 1,
};

static ADMISSIONS: ThresholdTable = ThresholdTable {
    steps: &[
        step(SeverityTier::Minimal, 0.0, "#10b981"),
        step(SeverityTier::Low, 50.0, "#84cc16"),
        step(SeverityTier::Moderate, 200.0, "#fbbf24"),
        step(SeverityTier::High, 500.0, "#f97316"),
        step(SeverityTier::VeryHigh, 1000.0, "#dc2626"),
    ],
    decimals: 0,
};

static PATIENTS: ThresholdTable = ThresholdTable {
    steps: &[
        step(SeverityTier::Minimal, 0.0, "#10b981"),
        step(SeverityTier::Low, 100.0, "#84cc16"),
        step(SeverityTier::Moderate, 500.0, "#fbbf24"),
        step(SeverityTier::High, 1500.0, "#f97316"),
        step(SeverityTier::VeryHigh, 3000.0, "#dc2626"),
    ],
    decimals: 0,
};

static WASTEWATER: ThresholdTable = ThresholdTable {
    steps: &[
        step(SeverityTier::Minimal, 0.0, "#10b981"),
        step(SeverityTier::Low, 500.0, "#fbbf24"),
        step(SeverityTier::Moderate, 2000.0, "#f59e0b"),
        step(SeverityTier::High, 5000.0, "#dc2626"),
        step(SeverityTier::VeryHigh, 10000.0, "#991b1b"),
    ],
    decimals: 0,
};

/// Severity band for `value` under the table of `metric`.
///
/// Zero, negative and non-finite values are always "No Data".
pub fn classify(value: f64, metric: MetricType) -> SeverityBand {
    if !value.is_finite() || value <= 0.0 {
        return SeverityBand::NO_DATA;
    }
    let table = metric.table();
    let mut current = &table.steps[0];
    for threshold in table.steps {
        if value >= threshold.lower {
            current = threshold;
        }
    }
    SeverityBand {
        tier: current.tier,
        color: current.color,
        label: current.tier.label(),
    }
}

/// Legend rows for `metric`: most severe tier first, "No Data" last.
pub fn legend(metric: MetricType) -> Vec<LegendEntry> {
    let table = metric.table();
    let steps = table.steps;
    let unit = 10f64.powi(-(table.decimals as i32));
    let bound = |v: f64| format_fixed(v, table.decimals);

    let mut entries: Vec<LegendEntry> = (0..steps.len())
        .rev()
        .map(|i| {
            let threshold = &steps[i];
            let range = match (i, steps.get(i + 1)) {
                (_, None) => format!("≥{}", bound(threshold.lower)),
                (0, Some(next)) => format!("<{}", bound(next.lower)),
                (_, Some(next)) => {
                    format!("{}-{}", bound(threshold.lower), bound(next.lower - unit))
                }
            };
            LegendEntry {
                tier: threshold.tier,
                color: threshold.color,
                label: format!("{} ({})", threshold.tier.label(), range),
            }
        })
        .collect();

    entries.push(LegendEntry {
        tier: SeverityTier::NoData,
        color: NO_DATA_COLOR,
        label: SeverityTier::NoData.label().to_string(),
    });
    entries
}
