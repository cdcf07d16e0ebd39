// botwatch/src/workers/growth.rs
//
// Day-over-day growth profile and the growth authenticity sub-score.
//
// Growth is measured between consecutive present points whose previous value
// is positive. Days above suspicious_pct are suspicious, above impossible_pct
// impossible. The sub-score starts at 100, loses suspicious_day_penalty per
// suspicious day once more than suspicious_days_allowed occur, and loses
// impossible_day_penalty per impossible day. Floor 0.

use tracing::debug;

use crate::config::{ConfigError, GrowthThresholds};
use crate::events::GrowthProfile;
use crate::state::series::TimeSeries;
use crate::state::window;

pub fn analyze_growth(
    series:     &TimeSeries,
    metric:     &str,
    thresholds: &GrowthThresholds,
) -> Result<Option<GrowthProfile>, ConfigError> {
    thresholds.validate()?;
    let Some(points) = series.points(metric) else { return Ok(None) };

    let rates: Vec<f64> = points.values.windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0] * 100.0)
        .collect();

    let suspicious = rates.iter().filter(|&&r| r > thresholds.suspicious_pct).count();
    let impossible = rates.iter().filter(|&&r| r > thresholds.impossible_pct).count();

    let profile = GrowthProfile {
        metric:                metric.to_string(),
        mean_daily_growth_pct: window::mean(&rates).unwrap_or(0.0),
        std_daily_growth_pct:  window::sample_std(&rates).unwrap_or(0.0),
        max_daily_growth_pct:  rates.iter().copied().reduce(f64::max).unwrap_or(0.0),
        suspicious_days:       suspicious,
        impossible_days:       impossible,
        authenticity_score:    growth_score(suspicious, impossible, thresholds),
    };

    debug!(
        "growth channel={} metric={} suspicious={} impossible={} score={:.1}",
        series.channel_id(), metric, suspicious, impossible, profile.authenticity_score
    );
    Ok(Some(profile))
}

pub fn growth_score(suspicious: usize, impossible: usize, thresholds: &GrowthThresholds) -> f64 {
    let mut score = 100.0;
    if suspicious > thresholds.suspicious_days_allowed {
        score -= suspicious as f64 * thresholds.suspicious_day_penalty;
    }
    score -= impossible as f64 * thresholds.impossible_day_penalty;
    score.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, NaiveDate};
    use crate::state::series::Observation;

    fn series(values: &[f64]) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let obs = values.iter().enumerate()
            .map(|(i, &v)| Observation::new(start + Days::new(i as u64)).with("Subscribers", v))
            .collect();
        TimeSeries::new("g", obs).unwrap()
    }

    #[test]
    fn few_suspicious_days_are_tolerated() {
        let g = growth_score(5, 0, &GrowthThresholds::default());
        assert_eq!(g, 100.0);
        assert_eq!(growth_score(6, 0, &GrowthThresholds::default()), 70.0);
    }

    #[test]
    fn impossible_days_cost_twenty_each() {
        // 10 → 200 is +1900%, counted as both suspicious and impossible
        let p = analyze_growth(&series(&[10.0, 200.0, 210.0, 5000.0]), "Subscribers", &GrowthThresholds::default())
            .unwrap().unwrap();
        assert_eq!(p.impossible_days, 2);
        assert_eq!(p.suspicious_days, 2);
        assert_eq!(p.authenticity_score, 60.0);
        assert!(p.max_daily_growth_pct > 2280.0); // 210 → 5000
    }

    #[test]
    fn zero_previous_values_are_skipped() {
        let p = analyze_growth(&series(&[0.0, 0.0, 50.0]), "Subscribers", &GrowthThresholds::default())
            .unwrap().unwrap();
        assert_eq!(p.suspicious_days, 0);
        assert_eq!(p.mean_daily_growth_pct, 0.0);
    }

    #[test]
    fn score_never_negative() {
        assert_eq!(growth_score(0, 9, &GrowthThresholds::default()), 0.0);
    }
}
