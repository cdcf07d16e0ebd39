// botwatch/src/workers/engagement.rs
//
// Views → subscribers conversion. Conversion is the peak subscriber count
// over total views in the series, in percent. Far above the organic band
// points at bought subscribers, far below at bought views.

use tracing::debug;

use crate::config::{ConfigError, EngagementThresholds};
use crate::events::{EngagementAssessment, EngagementLabel};
use crate::state::series::TimeSeries;

pub fn analyze_engagement(
    series:             &TimeSeries,
    views_metric:       &str,
    subscribers_metric: &str,
    thresholds:         &EngagementThresholds,
) -> Result<EngagementAssessment, ConfigError> {
    thresholds.validate()?;
    let views = series.points(views_metric);
    let subs  = series.points(subscribers_metric);

    let total_views       = views.as_ref().map_or(0.0, |p| p.sum());
    let total_subscribers = subs.as_ref().map_or(0.0, |p| p.max());

    if views.is_none() || subs.is_none() || total_views <= 0.0 {
        return Ok(EngagementAssessment { total_views, total_subscribers, ..Default::default() });
    }

    let rate = total_subscribers / total_views * 100.0;
    let (label, confidence) = if rate > thresholds.bot_inflation_pct {
        (EngagementLabel::BotInflation, 90.0)
    } else if rate < thresholds.view_botting_pct {
        (EngagementLabel::ViewBotting, 80.0)
    } else if (thresholds.organic_low_pct..=thresholds.organic_high_pct).contains(&rate) {
        (EngagementLabel::Organic, 85.0)
    } else {
        (EngagementLabel::Suspicious, 60.0)
    };

    debug!("engagement channel={} conversion={:.3}% label={}", series.channel_id(), rate, label);
    Ok(EngagementAssessment {
        conversion_rate_pct: Some(rate),
        label,
        confidence,
        total_views,
        total_subscribers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::state::series::Observation;

    fn series(views: f64, subs: Option<f64>) -> TimeSeries {
        let d = NaiveDate::from_ymd_opt(2024, 8, 1).unwrap();
        let mut o = Observation::new(d).with("Views", views);
        if let Some(s) = subs { o = o.with("Subscribers", s); }
        TimeSeries::new("e", vec![o]).unwrap()
    }

    fn label(views: f64, subs: f64) -> EngagementLabel {
        analyze_engagement(&series(views, Some(subs)), "Views", "Subscribers", &EngagementThresholds::default())
            .unwrap().label
    }

    #[test]
    fn labels_by_conversion_band() {
        assert_eq!(label(10_000.0, 100.0), EngagementLabel::Organic);      // 1%
        assert_eq!(label(10_000.0, 800.0), EngagementLabel::BotInflation); // 8%
        assert_eq!(label(100_000.0, 50.0), EngagementLabel::ViewBotting);  // 0.05%
        assert_eq!(label(10_000.0, 30.0), EngagementLabel::Suspicious);    // 0.3%
    }

    #[test]
    fn missing_subscribers_is_unknown() {
        let a = analyze_engagement(&series(100.0, None), "Views", "Subscribers", &EngagementThresholds::default()).unwrap();
        assert_eq!(a.label, EngagementLabel::Unknown);
        assert!(a.conversion_rate_pct.is_none());
    }

    #[test]
    fn zero_views_is_unknown() {
        assert_eq!(label(0.0, 10.0), EngagementLabel::Unknown);
    }
}
