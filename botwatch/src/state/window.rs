// botwatch/src/state/window.rs
//
// Trailing-window statistics over a metric's present points.
//
// All rolling functions use min_periods = 1 semantics: the window at index i
// covers max(0, i + 1 - window)..=i, so the first values are computed from
// whatever history exists instead of being left undefined. Standard deviation
// is the sample (n - 1) estimator and is undefined below two samples.

use std::ops::Range;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() { return None; }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 { return None; }
    let m   = mean(values)?;
    let var = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() { return None; }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// std / mean. Undefined for fewer than two samples or a non-positive mean.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    if m <= 0.0 { return None; }
    sample_std(values).map(|s| s / m)
}

fn trailing(i: usize, window: usize) -> Range<usize> {
    (i + 1).saturating_sub(window)..i + 1
}

pub fn rolling_median(values: &[f64], window: usize) -> Vec<Option<f64>> {
    (0..values.len()).map(|i| median(&values[trailing(i, window)])).collect()
}

pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    (0..values.len()).map(|i| mean(&values[trailing(i, window)])).collect()
}

pub fn rolling_std(values: &[f64], window: usize) -> Vec<Option<f64>> {
    (0..values.len()).map(|i| sample_std(&values[trailing(i, window)])).collect()
}

/// Full-length windows for pattern analysis. A series shorter than `window`
/// yields a single window spanning everything.
pub fn full_windows(len: usize, window: usize) -> Vec<Range<usize>> {
    if len == 0 { return vec![]; }
    if len <= window { return vec![0..len]; }
    (0..=len - window).map(|start| start..start + window).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_handles_even_and_odd_lengths() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn rolling_uses_available_history() {
        let v = [1.0, 2.0, 3.0, 4.0];
        let m = rolling_mean(&v, 3);
        assert_eq!(m, vec![Some(1.0), Some(1.5), Some(2.0), Some(3.0)]);
        let s = rolling_std(&v, 3);
        assert_eq!(s[0], None);
        assert!((s[3].unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn cov_undefined_for_zero_mean() {
        assert_eq!(coefficient_of_variation(&[0.0, 0.0, 0.0]), None);
        assert_eq!(coefficient_of_variation(&[5.0, 5.0, 5.0]), Some(0.0));
    }

    #[test]
    fn short_series_is_one_window() {
        assert_eq!(full_windows(4, 7), vec![0..4]);
        assert_eq!(full_windows(9, 7).len(), 3);
        assert!(full_windows(0, 7).is_empty());
    }
}
