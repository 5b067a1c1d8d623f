//! Analytics parameters, optionally loaded from a JSON file.

use flu_data::trend::{DEFAULT_ANOMALY_THRESHOLD, DEFAULT_DIRECTION_THRESHOLD, DEFAULT_WINDOW};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub moving_average_window: usize,
    pub anomaly_threshold: f64,
    pub forecast_horizon: usize,
    /// Points kept from a wastewater series, and weeks of national history fetched
    pub time_series_limit: usize,
    /// Weeks of hospital history shown in reports
    pub time_range_weeks: usize,
    /// Percent change beyond which a week-over-week change is up or down
    pub direction_threshold: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        AnalyticsConfig {
            moving_average_window: DEFAULT_WINDOW,
            anomaly_threshold: DEFAULT_ANOMALY_THRESHOLD,
            forecast_horizon: 4,
            time_series_limit: 52,
            time_range_weeks: 12,
            direction_threshold: DEFAULT_DIRECTION_THRESHOLD,
        }
    }
}

impl AnalyticsConfig {
    /// Read a config file; missing keys keep their defaults.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
        let config = serde_json::from_str(&text)
            .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))?;
        info!("Loaded analytics config from {}", path.display());
        Ok(config)
    }

    /// Defaults when no path is given.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_path(Path::new(path)),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalyticsConfig::load(None).unwrap();
        assert_eq!(config.moving_average_window, 3);
        assert_eq!(config.anomaly_threshold, 2.0);
        assert_eq!(config.forecast_horizon, 4);
        assert_eq!(config.time_series_limit, 52);
        assert_eq!(config.time_range_weeks, 12);
        assert_eq!(config.direction_threshold, 5.0);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: AnalyticsConfig =
            serde_json::from_str(r#"{"forecast_horizon": 8, "anomaly_threshold": 2.5}"#).unwrap();
        assert_eq!(config.forecast_horizon, 8);
        assert_eq!(config.anomaly_threshold, 2.5);
        assert_eq!(config.moving_average_window, 3);
    }

    #[test]
    fn test_from_path() {
        let path = std::env::temp_dir().join(format!("flu-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"time_range_weeks": 26}"#).unwrap();
        let config = AnalyticsConfig::load(path.to_str()).unwrap();
        assert_eq!(config.time_range_weeks, 26);
        std::fs::remove_file(&path).unwrap();

        assert!(AnalyticsConfig::from_path(&path).is_err());
    }
}
