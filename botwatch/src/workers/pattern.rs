// botwatch/src/workers/pattern.rs
//
// Windowed coefficient-of-variation classifier.
//
// Organic audiences fluctuate day to day even during sustained interest; a
// flat plateau held well above the channel's normal level is the shape of
// scheduled injection.
//   RECTANGULAR  some window has CoV < bot_cov while its mean exceeds
//                plateau_mean_multiple × global mean (lowest such CoV reported)
//   NATURAL      representative CoV > natural_cov
//   WARNING      otherwise
// The representative CoV is the largest among elevated windows (mean above the
// global mean), falling back to all windows when none is elevated.

use tracing::debug;

use crate::config::{ConfigError, PatternThresholds};
use crate::events::{PatternAssessment, PatternClass, PlateauWindow};
use crate::state::series::TimeSeries;
use crate::state::window;

struct WindowStat {
    start: usize,
    end:   usize, // exclusive
    mean:  f64,
    cov:   f64,
}

pub fn classify_pattern(
    series:     &TimeSeries,
    metric:     &str,
    window_len: usize,
    thresholds: &PatternThresholds,
) -> Result<Option<PatternAssessment>, ConfigError> {
    thresholds.validate()?;
    if window_len == 0 {
        return Err(ConfigError::Invalid { field: "pattern_window", reason: "must be at least 1".into() });
    }
    let Some(points) = series.points(metric) else { return Ok(None) };

    let global_mean = points.mean();
    let stats: Vec<WindowStat> = window::full_windows(points.len(), window_len).into_iter()
        .filter_map(|r| {
            let slice = &points.values[r.clone()];
            let cov   = window::coefficient_of_variation(slice)?;
            Some(WindowStat { start: r.start, end: r.end, mean: window::mean(slice)?, cov })
        })
        .collect();

    let plateau = stats.iter()
        .filter(|w| w.cov < thresholds.bot_cov && w.mean > thresholds.plateau_mean_multiple * global_mean)
        .min_by(|a, b| a.cov.total_cmp(&b.cov).then(a.start.cmp(&b.start)));

    let (cov, classification, plateau) = match plateau {
        Some(w) => (w.cov, PatternClass::Rectangular, Some(PlateauWindow {
            start: points.dates[w.start],
            end:   points.dates[w.end - 1],
            mean:  w.mean,
        })),
        None => {
            let elevated: Vec<&WindowStat> = stats.iter().filter(|w| w.mean > global_mean).collect();
            let pool: Vec<&WindowStat> = if elevated.is_empty() { stats.iter().collect() } else { elevated };
            let cov = pool.iter().map(|w| w.cov).fold(None, |acc: Option<f64>, c| Some(acc.map_or(c, |a| a.max(c))));
            match cov {
                Some(c) if c > thresholds.natural_cov => (c, PatternClass::Natural, None),
                Some(c)                              => (c, PatternClass::Warning, None),
                None                                 => (0.0, PatternClass::Warning, None),
            }
        }
    };

    debug!(
        "pattern channel={} metric={} class={} cov={:.3}",
        series.channel_id(), metric, classification, cov
    );

    Ok(Some(PatternAssessment {
        metric:                   metric.to_string(),
        coefficient_of_variation: cov,
        classification,
        natural_cov:              thresholds.natural_cov,
        bot_cov:                  thresholds.bot_cov,
        plateau_mean_multiple:    thresholds.plateau_mean_multiple,
        windows_evaluated:        stats.len(),
        plateau,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, NaiveDate};
    use crate::state::series::Observation;

    fn series(values: &[f64]) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let obs = values.iter().enumerate()
            .map(|(i, &v)| Observation::new(start + Days::new(i as u64)).with("Views", v))
            .collect();
        TimeSeries::new("p", obs).unwrap()
    }

    fn classify(values: &[f64]) -> PatternAssessment {
        classify_pattern(&series(values), "Views", 7, &PatternThresholds::default()).unwrap().unwrap()
    }

    #[test]
    fn flat_elevated_block_is_rectangular() {
        let mut v = vec![100.0; 14];
        v.extend([1000.0; 8]);
        v.extend([100.0; 14]);
        let a = classify(&v);
        assert_eq!(a.classification, PatternClass::Rectangular);
        assert_eq!(a.coefficient_of_variation, 0.0);
        let plateau = a.plateau.unwrap();
        assert_eq!(plateau.start, NaiveDate::from_ymd_opt(2024, 6, 15).unwrap());
        assert_eq!(plateau.mean, 1000.0);
    }

    #[test]
    fn flat_baseline_without_event_is_warning() {
        let a = classify(&[50.0; 21]);
        assert_eq!(a.classification, PatternClass::Warning);
        assert!(a.plateau.is_none());
    }

    #[test]
    fn volatile_series_is_natural() {
        let v: Vec<f64> = (0..28).map(|i| if i % 2 == 0 { 100.0 } else { 300.0 }).collect();
        assert_eq!(classify(&v).classification, PatternClass::Natural);
    }

    #[test]
    fn all_zero_series_has_no_cov() {
        let a = classify(&[0.0; 10]);
        assert_eq!(a.classification, PatternClass::Warning);
        assert_eq!(a.coefficient_of_variation, 0.0);
    }

    #[test]
    fn missing_metric_is_none() {
        let r = classify_pattern(&series(&[1.0]), "Likes", 7, &PatternThresholds::default()).unwrap();
        assert!(r.is_none());
    }
}
