// botwatch/src/workers/baseline.rs
//
// Robust reference level for spike ratios.
//
// Trailing rolling median (min_periods = 1) aligned to the metric's present
// points. A median that is zero or undefined falls back to the metric's global
// mean; when that is zero too the baseline stays 0 and ratios read 0.

use crate::config::ConfigError;
use crate::state::series::MetricPoints;
use crate::state::window;

pub fn baseline(points: &MetricPoints, window: usize) -> Result<Vec<f64>, ConfigError> {
    if window == 0 {
        return Err(ConfigError::Invalid { field: "rolling_window", reason: "must be at least 1".into() });
    }
    let fallback = points.mean();
    Ok(window::rolling_median(&points.values, window)
        .into_iter()
        .map(|m| match m {
            Some(v) if v > 0.0 => v,
            _ if fallback > 0.0 => fallback,
            _ => 0.0,
        })
        .collect())
}

/// `value / baseline`, 0 where the baseline is not positive.
pub fn ratios(values: &[f64], baseline: &[f64]) -> Vec<f64> {
    values.iter().zip(baseline)
        .map(|(&v, &b)| if b > 0.0 { v / b } else { 0.0 })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, NaiveDate};

    fn points(values: &[f64]) -> MetricPoints {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        MetricPoints {
            metric: "Views".into(),
            dates:  (0..values.len() as u64).map(|i| start + Days::new(i)).collect(),
            values: values.to_vec(),
        }
    }

    #[test]
    fn single_outlier_barely_moves_median() {
        let mut v = vec![100.0; 29];
        v.push(100_000.0);
        let b = baseline(&points(&v), 30).unwrap();
        assert_eq!(b[29], 100.0);
    }

    #[test]
    fn zero_median_falls_back_to_global_mean() {
        let b = baseline(&points(&[0.0, 0.0, 0.0, 40.0]), 3).unwrap();
        assert_eq!(b[0], 10.0);
        assert_eq!(b[3], 10.0); // median of [0, 0, 40]
    }

    #[test]
    fn all_zero_series_gives_zero_ratios() {
        let p = points(&[0.0, 0.0, 0.0]);
        let b = baseline(&p, 30).unwrap();
        assert_eq!(ratios(&p.values, &b), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn zero_window_is_rejected() {
        let err = baseline(&points(&[1.0, 2.0, 3.0]), 0).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "rolling_window", .. }));
    }
}
