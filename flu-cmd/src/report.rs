//! Reports computed from snapshot files.

use crate::{
    config::AnalyticsConfig,
    fetch::{HOSPITAL_SNAPSHOT, NATIONAL_SNAPSHOT, NEXTSTRAIN_SNAPSHOT, WASTEWATER_SNAPSHOT},
};
use chrono::{NaiveDate, Utc};
use flu_cdc::{
    jurisdiction::{
        parse_jurisdiction_payload, process_jurisdiction_records, JurisdictionMetric,
        NormalizedJurisdictionRecord, NATIONAL_JURISDICTION,
    },
    nextstrain::{parse_nextstrain_payload, summarize_tree, NextstrainSummary},
    wastewater::{
        parse_wastewater_payload, process_wastewater_records, NormalizedWastewaterRecord,
        RawWastewaterRecord,
    },
};
use flu_data::{
    aggregate::{recent_weeks, state_time_series},
    choropleth::{
        hospital_metric, map_fills, map_values, wastewater_map_values, MapFill, WastewaterOverview,
    },
    dashboard::{dashboard_metrics, DashboardMetrics},
    severity::{legend, LegendEntry, MetricType},
    trend::{calculate_trend, detect_anomalies, forecast_linear, moving_average, TrendResult},
};
use flu_utils::{
    dates::format_date,
    format::{format_display_date, format_large_number, format_number, format_percentage},
};
use log::{debug, info};
use serde::Serialize;
use std::{fs, path::Path};

fn read_snapshot(dir: &Path, name: &str) -> anyhow::Result<String> {
    let path = dir.join(name);
    fs::read_to_string(&path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to read {}: {} (run `flu-cli fetch` first)",
            path.display(),
            e
        )
    })
}

pub fn load_hospital(dir: &Path) -> anyhow::Result<Vec<NormalizedJurisdictionRecord>> {
    let raw = parse_jurisdiction_payload(&read_snapshot(dir, HOSPITAL_SNAPSHOT)?)?;
    Ok(process_jurisdiction_records(&raw))
}

/// National records from the national snapshot, or from the
/// all-jurisdiction snapshot when there is none.
pub fn load_national(dir: &Path) -> anyhow::Result<Vec<NormalizedJurisdictionRecord>> {
    let records = if dir.join(NATIONAL_SNAPSHOT).exists() {
        let raw = parse_jurisdiction_payload(&read_snapshot(dir, NATIONAL_SNAPSHOT)?)?;
        process_jurisdiction_records(&raw)
    } else {
        debug!("No {} in {}, using {}", NATIONAL_SNAPSHOT, dir.display(), HOSPITAL_SNAPSHOT);
        load_hospital(dir)?
    };
    Ok(records.into_iter().filter(|r| r.is_national()).collect())
}

pub fn load_wastewater(dir: &Path) -> anyhow::Result<Vec<RawWastewaterRecord>> {
    parse_wastewater_payload(&read_snapshot(dir, WASTEWATER_SNAPSHOT)?)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub dashboard: Option<DashboardMetrics>,
    pub wastewater: Option<WastewaterOverview>,
    pub nextstrain: Option<NextstrainSummary>,
}

/// Dashboard cards plus whichever optional panels have snapshots.
pub fn build_summary(dir: &Path, config: &AnalyticsConfig) -> anyhow::Result<Summary> {
    let national = load_national(dir)?;
    let dashboard = dashboard_metrics(&national, config.direction_threshold);

    let wastewater = if dir.join(WASTEWATER_SNAPSHOT).exists() {
        Some(WastewaterOverview::from_raw(&load_wastewater(dir)?))
    } else {
        None
    };

    let nextstrain = if dir.join(NEXTSTRAIN_SNAPSHOT).exists() {
        let data = parse_nextstrain_payload(&read_snapshot(dir, NEXTSTRAIN_SNAPSHOT)?)?;
        Some(summarize_tree(&data.tree, Utc::now()))
    } else {
        None
    };

    Ok(Summary {
        dashboard,
        wastewater,
        nextstrain,
    })
}

pub fn run_summary(dir: &Path, config: &AnalyticsConfig) -> anyhow::Result<()> {
    let summary = build_summary(dir, config)?;
    if let Some(dashboard) = &summary.dashboard {
        info!(
            "Week of {}: {} flu patients ({}), {} in ICU",
            format_display_date(&dashboard.week_ending),
            format_large_number(dashboard.total_patients),
            format_percentage(dashboard.patients_change.value, 1),
            format_number(dashboard.icu_patients)
        );
    }
    print_json(&summary)
}

/// Severity fills per jurisdiction for `metric`.
pub fn build_map(dir: &Path, metric: MetricType) -> anyhow::Result<Vec<MapFill>> {
    let values = match hospital_metric(metric) {
        Some(column) => map_values(&load_hospital(dir)?, column),
        None => wastewater_map_values(&process_wastewater_records(&load_wastewater(dir)?)),
    };
    Ok(map_fills(&values, metric))
}

pub fn write_map_csv(fills: &[MapFill], path: &Path) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["jurisdiction", "value", "color", "label"])?;
    for fill in fills {
        writer.write_record([
            fill.jurisdiction.clone(),
            fill.value.to_string(),
            fill.band.color.to_string(),
            fill.band.label.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn run_map(dir: &Path, metric: MetricType, csv_path: Option<&Path>) -> anyhow::Result<()> {
    let fills = build_map(dir, metric)?;
    match csv_path {
        Some(path) => {
            write_map_csv(&fills, path)?;
            info!("Wrote {} map rows to {}", fills.len(), path.display());
            Ok(())
        }
        None => print_json(&fills),
    }
}

pub fn run_legend(metric: MetricType) -> anyhow::Result<()> {
    let entries: Vec<LegendEntry> = legend(metric);
    print_json(&entries)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendReport {
    pub jurisdiction: String,
    pub metric: MetricType,
    pub dates: Vec<String>,
    pub values: Vec<f64>,
    pub moving_average: Vec<f64>,
    pub trend: TrendResult,
    pub anomalies: Vec<usize>,
    pub forecast: Vec<f64>,
}

/// Run every series statistic over `points` (oldest first).
pub fn analyze_series(
    jurisdiction: &str,
    metric: MetricType,
    points: &[(NaiveDate, f64)],
    config: &AnalyticsConfig,
) -> TrendReport {
    let values: Vec<f64> = points.iter().map(|&(_, value)| value).collect();
    TrendReport {
        jurisdiction: jurisdiction.to_string(),
        metric,
        dates: points.iter().map(|(date, _)| format_date(date)).collect(),
        moving_average: moving_average(&values, config.moving_average_window),
        trend: calculate_trend(&values),
        anomalies: detect_anomalies(&values, config.anomaly_threshold),
        forecast: forecast_linear(&values, config.forecast_horizon),
        values,
    }
}

fn hospital_points(
    records: &[NormalizedJurisdictionRecord],
    column: JurisdictionMetric,
    weeks: usize,
) -> Vec<(NaiveDate, f64)> {
    let known: Vec<NormalizedJurisdictionRecord> = records
        .iter()
        .filter(|r| r.has_known_week_ending())
        .cloned()
        .collect();
    recent_weeks(&known, weeks)
        .iter()
        .map(|r| (r.week_ending, r.value(column)))
        .collect()
}

fn wastewater_points(records: &[NormalizedWastewaterRecord]) -> Vec<(NaiveDate, f64)> {
    records
        .iter()
        .map(|r| (r.collection_date, r.viral_concentration))
        .collect()
}

pub fn build_trend(
    dir: &Path,
    metric: MetricType,
    jurisdiction: Option<&str>,
    config: &AnalyticsConfig,
) -> anyhow::Result<TrendReport> {
    let (code, points) = match hospital_metric(metric) {
        Some(column) => {
            let code = jurisdiction
                .unwrap_or(NATIONAL_JURISDICTION)
                .trim()
                .to_uppercase();
            let records = if code == NATIONAL_JURISDICTION {
                load_national(dir)?
            } else {
                load_hospital(dir)?
                    .into_iter()
                    .filter(|r| r.jurisdiction == code)
                    .collect()
            };
            let points = hospital_points(&records, column, config.time_range_weeks);
            (code, points)
        }
        None => {
            let code = jurisdiction
                .ok_or_else(|| anyhow::anyhow!("--jurisdiction is required for wastewater trends"))?
                .trim()
                .to_uppercase();
            let records = process_wastewater_records(&load_wastewater(dir)?);
            let series = state_time_series(&records, &code, config.time_series_limit);
            (code, wastewater_points(&series))
        }
    };
    debug!("Analyzing {} {} points for {}", points.len(), metric, code);
    Ok(analyze_series(&code, metric, &points, config))
}

pub fn run_trend(
    dir: &Path,
    metric: MetricType,
    jurisdiction: Option<&str>,
    config: &AnalyticsConfig,
) -> anyhow::Result<()> {
    print_json(&build_trend(dir, metric, jurisdiction, config)?)
}

/// Write normalized hospital records, one column per metric.
pub fn write_hospital_csv(
    records: &[NormalizedJurisdictionRecord],
    path: &Path,
) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut header = vec!["jurisdiction", "week_ending"];
    header.extend(JurisdictionMetric::ALL.iter().map(|m| m.field_name()));
    writer.write_record(&header)?;
    for record in records {
        let mut row = vec![record.jurisdiction.clone(), format_date(&record.week_ending)];
        row.extend(
            JurisdictionMetric::ALL
                .iter()
                .map(|&metric| record.value(metric).to_string()),
        );
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_wastewater_csv(
    records: &[NormalizedWastewaterRecord],
    path: &Path,
) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn run_export(
    dir: &Path,
    hospital_csv: Option<&Path>,
    wastewater_csv: Option<&Path>,
) -> anyhow::Result<()> {
    if hospital_csv.is_none() && wastewater_csv.is_none() {
        anyhow::bail!("Nothing to export: pass --hospital-csv and/or --wastewater-csv");
    }
    if let Some(path) = hospital_csv {
        let records = load_hospital(dir)?;
        write_hospital_csv(&records, path)?;
        info!("Exported {} hospital records to {}", records.len(), path.display());
    }
    if let Some(path) = wastewater_csv {
        let records = process_wastewater_records(&load_wastewater(dir)?);
        write_wastewater_csv(&records, path)?;
        info!("Exported {} wastewater records to {}", records.len(), path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::write_snapshot;
    use flu_data::severity::SeverityTier;
    use std::path::PathBuf;

    const HOSPITAL: &str = r#"[
        {"weekendingdate": "2024-01-20T00:00:00.000", "jurisdiction": "USA", "totalconffluhosppats": "1300", "totalconfflunewadm": "420", "totalconfflunewadmper100k": "1.2"},
        {"weekendingdate": "2024-01-13T00:00:00.000", "jurisdiction": "USA", "totalconffluhosppats": "1100", "totalconfflunewadm": "400", "totalconfflunewadmper100k": "1.1"},
        {"weekendingdate": "2024-01-06T00:00:00.000", "jurisdiction": "USA", "totalconffluhosppats": "1000", "totalconfflunewadm": "300", "totalconfflunewadmper100k": "0.9"},
        {"weekendingdate": "2024-01-20T00:00:00.000", "jurisdiction": "CA", "totalconffluhosppats": "250", "totalconfflunewadm": "90", "totalconfflunewadmper100k": "6.4"},
        {"weekendingdate": "2024-01-20T00:00:00.000", "jurisdiction": "VT", "totalconffluhosppats": "4", "totalconfflunewadm": "0", "totalconfflunewadmper100k": "0"}
    ]"#;

    const WASTEWATER: &str = r#"[
        {"sewershed_id": "1", "wwtp_jurisdiction": "ca", "sample_collect_date": "2024-01-03", "pcr_target_avg_conc": "800"},
        {"sewershed_id": "1", "wwtp_jurisdiction": "ca", "sample_collect_date": "2024-01-10", "pcr_target_avg_conc": "1600"},
        {"sewershed_id": "2", "wwtp_jurisdiction": "ca", "sample_collect_date": "2024-01-17", "pcr_target_avg_conc": "3200"},
        {"sewershed_id": "3", "wwtp_jurisdiction": "ny", "sample_collect_date": "2024-01-17"}
    ]"#;

    fn fixture_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("flu-report-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        write_snapshot(&dir.join(HOSPITAL_SNAPSHOT), HOSPITAL).unwrap();
        write_snapshot(&dir.join(WASTEWATER_SNAPSHOT), WASTEWATER).unwrap();
        dir
    }

    #[test]
    fn test_summary_without_optional_snapshots() {
        let dir = fixture_dir("summary");
        fs::remove_file(dir.join(WASTEWATER_SNAPSHOT)).unwrap();
        let summary = build_summary(&dir, &AnalyticsConfig::default()).unwrap();
        let dashboard = summary.dashboard.unwrap();
        assert_eq!(dashboard.total_patients, 1300.0);
        assert!(summary.wastewater.is_none());
        assert!(summary.nextstrain.is_none());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_summary_with_nextstrain() {
        let dir = fixture_dir("nextstrain");
        write_snapshot(
            &dir.join(NEXTSTRAIN_SNAPSHOT),
            r#"{"tree": {"node_attrs": {"clade": {"value": "23A"}}}}"#,
        )
        .unwrap();
        let summary = build_summary(&dir, &AnalyticsConfig::default()).unwrap();
        assert_eq!(summary.wastewater.unwrap().sample_count, 3);
        assert_eq!(summary.nextstrain.unwrap().clades[0].name, "23A");
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_build_map() {
        let dir = fixture_dir("map");
        let fills = build_map(&dir, MetricType::Per100k).unwrap();
        let codes: Vec<&str> = fills.iter().map(|f| f.jurisdiction.as_str()).collect();
        assert_eq!(codes, vec!["CA", "VT"]);
        assert_eq!(fills[0].band.tier, SeverityTier::VeryHigh);
        assert_eq!(fills[1].band.tier, SeverityTier::NoData);

        let fills = build_map(&dir, MetricType::Wastewater).unwrap();
        assert_eq!(fills.len(), 1);
        assert!((fills[0].value - 1866.6666666666667).abs() < 1e-6);

        let csv_path = dir.join("map.csv");
        write_map_csv(&fills, &csv_path).unwrap();
        let text = fs::read_to_string(&csv_path).unwrap();
        assert!(text.starts_with("jurisdiction,value,color,label\n"));
        assert!(text.contains("CA,"));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_build_trend() {
        let dir = fixture_dir("trend");
        let config = AnalyticsConfig::default();

        let report = build_trend(&dir, MetricType::Admissions, None, &config).unwrap();
        assert_eq!(report.jurisdiction, "USA");
        assert_eq!(report.dates, vec!["2024-01-06", "2024-01-13", "2024-01-20"]);
        assert_eq!(report.values, vec![300.0, 400.0, 420.0]);
        assert_eq!(report.moving_average.len(), 1);
        assert_eq!(report.forecast.len(), config.forecast_horizon);

        let report = build_trend(&dir, MetricType::Wastewater, Some("ca"), &config).unwrap();
        assert_eq!(report.values, vec![800.0, 1600.0, 3200.0]);
        assert!(build_trend(&dir, MetricType::Wastewater, None, &config).is_err());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_export() {
        let dir = fixture_dir("export");
        let hospital_csv = dir.join("hospital.csv");
        let wastewater_csv = dir.join("wastewater.csv");
        run_export(&dir, Some(&hospital_csv), Some(&wastewater_csv)).unwrap();

        let hospital = fs::read_to_string(&hospital_csv).unwrap();
        let mut lines = hospital.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("jurisdiction,week_ending,numinptbeds"));
        assert_eq!(lines.count(), 5);

        let mut reader = csv::Reader::from_path(&wastewater_csv).unwrap();
        let rows: Vec<NormalizedWastewaterRecord> =
            reader.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].jurisdiction, "CA");

        assert!(run_export(&dir, None, None).is_err());
        fs::remove_dir_all(&dir).unwrap();
    }
}
