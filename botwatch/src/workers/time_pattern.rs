// botwatch/src/workers/time_pattern.rs
//
// Weekend vs weekday activity. Scheduled campaigns often ignore the calendar,
// or run only on one side of it.

use chrono::{Datelike, Weekday};
use tracing::debug;

use crate::config::{ConfigError, WeekdayThresholds};
use crate::events::{WeekdayPattern, WeekdayProfile};
use crate::state::series::TimeSeries;
use crate::state::window;

/// None when the metric is missing, either group is empty, or the weekday
/// average is zero.
pub fn analyze_weekday(
    series:     &TimeSeries,
    metric:     &str,
    thresholds: &WeekdayThresholds,
) -> Result<Option<WeekdayProfile>, ConfigError> {
    thresholds.validate()?;
    let Some(points) = series.points(metric) else { return Ok(None) };

    let (weekend, weekday): (Vec<(usize, f64)>, Vec<(usize, f64)>) = points.values.iter().copied()
        .enumerate()
        .partition(|&(i, _)| matches!(points.dates[i].weekday(), Weekday::Sat | Weekday::Sun));
    let weekend: Vec<f64> = weekend.into_iter().map(|(_, v)| v).collect();
    let weekday: Vec<f64> = weekday.into_iter().map(|(_, v)| v).collect();

    let (Some(weekend_avg), Some(weekday_avg)) = (window::mean(&weekend), window::mean(&weekday)) else {
        return Ok(None);
    };
    if weekday_avg == 0.0 { return Ok(None); }

    let ratio = weekend_avg / weekday_avg;
    let pattern = if ratio < thresholds.bot_low || ratio > thresholds.bot_high {
        WeekdayPattern::BotPattern
    } else if (thresholds.natural_low..=thresholds.natural_high).contains(&ratio) {
        WeekdayPattern::Natural
    } else {
        WeekdayPattern::Suspicious
    };

    debug!("weekday channel={} metric={} ratio={:.2} pattern={}", series.channel_id(), metric, ratio, pattern);
    Ok(Some(WeekdayProfile {
        metric: metric.to_string(),
        weekend_avg,
        weekday_avg,
        weekend_ratio: ratio,
        pattern,
    }))
}
