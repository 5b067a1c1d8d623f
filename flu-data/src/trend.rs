//! Trend statistics over a chronologically ordered series (oldest first).

use crate::aggregate::average;
use serde::{Deserialize, Serialize};

/// Default moving-average window.
pub const DEFAULT_WINDOW: usize = 3;

/// Default z-score threshold for anomaly detection.
pub const DEFAULT_ANOMALY_THRESHOLD: f64 = 2.0;

/// Default percent threshold for [`trend_direction`].
pub const DEFAULT_DIRECTION_THRESHOLD: f64 = 5.0;

/// Below this absolute first-to-last change a series is stable.
const STABLE_PERCENT: f64 = 5.0;
const MODERATE_PERCENT: f64 = 10.0;
const STRONG_PERCENT: f64 = 20.0;
const STRONG_VARIATION: f64 = 0.2;

/// Series shorter than this never contain anomalies.
const MIN_ANOMALY_POINTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendStrength {
    Strong,
    Moderate,
    Weak,
}

/// Slope, direction, strength and overall change of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendResult {
    pub slope: f64,
    pub direction: TrendDirection,
    pub strength: TrendStrength,
    /// First-to-last change, in percent
    pub percent_change: f64,
}

impl Default for TrendResult {
    fn default() -> Self {
        TrendResult {
            slope: 0.0,
            direction: TrendDirection::Stable,
            strength: TrendStrength::Weak,
            percent_change: 0.0,
        }
    }
}

/// Direction of a single period-over-period change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeDirection {
    Up,
    Down,
    Neutral,
}

/// Population standard deviation, 0 for an empty slice.
fn standard_deviation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = average(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Ordinary least squares fit of `values` against their indices.
///
/// Returns `(slope, intercept)`. A single point gives a flat line through
/// it; an empty series gives `(0, 0)`.
pub fn linear_regression(values: &[f64]) -> (f64, f64) {
    match values.len() {
        0 => return (0.0, 0.0),
        1 => return (0.0, values[0]),
        _ => {}
    }
    let x_mean = (values.len() - 1) as f64 / 2.0;
    let y_mean = average(values);
    let (mut covariance, mut x_variance) = (0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        covariance += dx * (y - y_mean);
        x_variance += dx * dx;
    }
    let slope = covariance / x_variance;
    (slope, y_mean - slope * x_mean)
}

/// Classify the trend of a series.
///
/// Direction is stable when the first-to-last change is under 5%, and
/// otherwise follows the sign of the regression slope. Strength is strong
/// when the change exceeds 20% and the coefficient of variation exceeds
/// 0.2, moderate when the change exceeds 10%, weak otherwise.
pub fn calculate_trend(values: &[f64]) -> TrendResult {
    if values.len() < 2 {
        return TrendResult::default();
    }

    let (slope, _) = linear_regression(values);

    let first = values[0];
    let last = values[values.len() - 1];
    let percent_change = if first != 0.0 {
        (last - first) / first * 100.0
    } else {
        0.0
    };

    let direction = if percent_change.abs() < STABLE_PERCENT || slope == 0.0 {
        TrendDirection::Stable
    } else if slope > 0.0 {
        TrendDirection::Increasing
    } else {
        TrendDirection::Decreasing
    };

    let mean = average(values);
    let variation = if mean != 0.0 {
        standard_deviation(values) / mean
    } else {
        0.0
    };

    let strength = if percent_change.abs() > STRONG_PERCENT && variation > STRONG_VARIATION {
        TrendStrength::Strong
    } else if percent_change.abs() > MODERATE_PERCENT {
        TrendStrength::Moderate
    } else {
        TrendStrength::Weak
    };

    TrendResult {
        slope,
        direction,
        strength,
        percent_change,
    }
}

/// Mean of each full window of `window` consecutive values.
///
/// A series shorter than the window (or a zero window) is returned as is.
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || values.len() < window {
        return values.to_vec();
    }
    values.windows(window).map(average).collect()
}

/// Indices whose z-score reaches `threshold`.
///
/// Uses the population mean and standard deviation. Series shorter than
/// three points and series with no variance have no anomalies.
pub fn detect_anomalies(values: &[f64], threshold: f64) -> Vec<usize> {
    if values.len() < MIN_ANOMALY_POINTS {
        return Vec::new();
    }
    let mean = average(values);
    let deviation = standard_deviation(values);
    if deviation == 0.0 || !deviation.is_finite() {
        return Vec::new();
    }
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| ((*v - mean) / deviation).abs() >= threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Extend the regression line `horizon` points past the end of the series.
///
/// Forecasts are clamped at 0. With fewer than two points the single value
/// (or 0) is repeated.
pub fn forecast_linear(values: &[f64], horizon: usize) -> Vec<f64> {
    if values.len() < 2 {
        return vec![values.first().copied().unwrap_or(0.0); horizon];
    }
    let (slope, intercept) = linear_regression(values);
    let n = values.len();
    (n..n + horizon)
        .map(|x| (slope * x as f64 + intercept).max(0.0))
        .collect()
}

/// Percent change from `previous` to `current`.
///
/// From a previous value of 0 this is 100 for a positive current value and
/// 0 otherwise.
pub fn percent_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return if current > 0.0 { 100.0 } else { 0.0 };
    }
    (current - previous) / previous * 100.0
}

/// Week-over-week percent change, 0 when the previous week is 0.
pub fn week_over_week_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return 0.0;
    }
    (current - previous) / previous * 100.0
}

/// Up above `threshold` percent, down below `-threshold`, neutral between.
pub fn trend_direction(percent: f64, threshold: f64) -> ChangeDirection {
    if percent > threshold {
        ChangeDirection::Up
    } else if percent < -threshold {
        ChangeDirection::Down
    } else {
        ChangeDirection::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_degenerate_trend() {
        assert_eq!(calculate_trend(&[]), TrendResult::default());
        assert_eq!(calculate_trend(&[42.0]), TrendResult::default());
        let result = calculate_trend(&[7.0]);
        assert_eq!(result.direction, TrendDirection::Stable);
        assert_eq!(result.strength, TrendStrength::Weak);
    }

    #[test]
    fn test_flat_trend_is_stable() {
        let result = calculate_trend(&[10.0, 10.0, 10.0, 10.0]);
        assert_eq!(result.slope, 0.0);
        assert_eq!(result.percent_change, 0.0);
        assert_eq!(result.direction, TrendDirection::Stable);
        assert_eq!(result.strength, TrendStrength::Weak);
    }

    #[test]
    fn test_zero_slope_with_large_change_is_stable() {
        // index-weighted deviations cancel: -1.5*-10 - 0.5*20 + 0.5*-10 + 1.5*0 = 0
        let result = calculate_trend(&[10.0, 40.0, 10.0, 20.0]);
        assert_eq!(result.slope, 0.0);
        assert!((result.percent_change - 100.0).abs() < EPSILON);
        assert_eq!(result.direction, TrendDirection::Stable);
        assert_eq!(result.strength, TrendStrength::Strong);
    }

    #[test]
    fn test_increasing_trend() {
        let values = [10.0, 20.0, 30.0, 40.0];
        let result = calculate_trend(&values);
        assert!((result.slope - 10.0).abs() < EPSILON);
        assert!((result.percent_change - 300.0).abs() < EPSILON);
        assert_eq!(result.direction, TrendDirection::Increasing);

        // mean 25, population stddev sqrt(125)
        let variation = 125f64.sqrt() / 25.0;
        assert!(variation > 0.2);
        assert_eq!(result.strength, TrendStrength::Strong);
    }

    #[test]
    fn test_decreasing_and_moderate() {
        let result = calculate_trend(&[100.0, 80.0, 60.0]);
        assert_eq!(result.direction, TrendDirection::Decreasing);
        assert!((result.percent_change + 40.0).abs() < EPSILON);
        assert_eq!(result.strength, TrendStrength::Strong);

        // 12% change with low dispersion
        let result = calculate_trend(&[100.0, 104.0, 108.0, 112.0]);
        assert_eq!(result.direction, TrendDirection::Increasing);
        assert_eq!(result.strength, TrendStrength::Moderate);

        let result = calculate_trend(&[100.0, 101.0, 103.0]);
        assert_eq!(result.direction, TrendDirection::Stable);
        assert_eq!(result.strength, TrendStrength::Weak);
    }

    #[test]
    fn test_zero_first_value() {
        let result = calculate_trend(&[0.0, 5.0, 10.0]);
        assert_eq!(result.percent_change, 0.0);
        assert_eq!(result.direction, TrendDirection::Stable);
        assert!(result.slope > 0.0);
    }

    #[test]
    fn test_moving_average() {
        assert_eq!(moving_average(&[1.0, 2.0, 3.0, 4.0, 5.0], 3), vec![2.0, 3.0, 4.0]);
        assert_eq!(moving_average(&[1.0, 2.0], 3), vec![1.0, 2.0]);
        assert_eq!(moving_average(&[1.0, 2.0], 0), vec![1.0, 2.0]);
        assert_eq!(moving_average(&[4.0, 6.0], DEFAULT_WINDOW - 1), vec![5.0]);
    }

    #[test]
    fn test_detect_anomalies() {
        assert_eq!(detect_anomalies(&[10.0, 10.0, 10.0, 10.0, 100.0], 2.0), vec![4]);
        assert!(detect_anomalies(&[5.0, 5.0, 5.0], 2.0).is_empty());
        assert!(detect_anomalies(&[1.0, 1000.0], 0.1).is_empty());
        assert_eq!(detect_anomalies(&[1.0, 2.0, 3.0], 1.0), vec![0, 2]);
    }

    #[test]
    fn test_forecast_linear() {
        assert_eq!(forecast_linear(&[1.0, 2.0, 3.0], 2), vec![4.0, 5.0]);
        assert_eq!(forecast_linear(&[7.0], 3), vec![7.0, 7.0, 7.0]);
        assert_eq!(forecast_linear(&[], 2), vec![0.0, 0.0]);
        assert_eq!(forecast_linear(&[30.0, 20.0, 10.0], 3), vec![0.0, 0.0, 0.0]);
        assert!(forecast_linear(&[1.0, 2.0], 0).is_empty());
    }

    #[test]
    fn test_linear_regression() {
        let (slope, intercept) = linear_regression(&[1.0, 2.0, 3.0]);
        assert!((slope - 1.0).abs() < EPSILON);
        assert!((intercept - 1.0).abs() < EPSILON);
        assert_eq!(linear_regression(&[]), (0.0, 0.0));
        assert_eq!(linear_regression(&[3.5]), (0.0, 3.5));
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(0.0, 0.0), 0.0);
        assert_eq!(percent_change(5.0, 0.0), 100.0);
        assert_eq!(percent_change(0.0, 5.0), -100.0);
        assert_eq!(percent_change(15.0, 10.0), 50.0);
        assert_eq!(percent_change(-5.0, 0.0), 0.0);
    }

    #[test]
    fn test_week_over_week_and_direction() {
        assert_eq!(week_over_week_change(5.0, 0.0), 0.0);
        assert!((week_over_week_change(110.0, 100.0) - 10.0).abs() < EPSILON);
        assert_eq!(trend_direction(10.0, DEFAULT_DIRECTION_THRESHOLD), ChangeDirection::Up);
        assert_eq!(trend_direction(-6.0, DEFAULT_DIRECTION_THRESHOLD), ChangeDirection::Down);
        assert_eq!(trend_direction(5.0, DEFAULT_DIRECTION_THRESHOLD), ChangeDirection::Neutral);
    }

    #[test]
    fn test_serialized_labels() {
        let json = serde_json::to_value(calculate_trend(&[10.0, 20.0, 30.0, 40.0])).unwrap();
        assert_eq!(json["direction"], "increasing");
        assert_eq!(json["strength"], "strong");
        assert!(json.get("percentChange").is_some());
        assert_eq!(serde_json::to_value(ChangeDirection::Neutral).unwrap(), "neutral");
    }
}
