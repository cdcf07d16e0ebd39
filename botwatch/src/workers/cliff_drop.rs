// botwatch/src/workers/cliff_drop.rs
//
// Cliff-drop detector — sharp single-step decreases between consecutive
// present points. Platforms purging purchased subscribers or views leave
// exactly this shape: a one-day fall to a fraction of the previous level.

use tracing::debug;

use crate::config::{validate_drop_threshold, ConfigError};
use crate::events::CliffDrop;
use crate::state::series::TimeSeries;

const MAX_PURGE_PROBABILITY: f64 = 95.0;

pub fn detect_drops(series: &TimeSeries, metric: &str, threshold: f64) -> Result<Vec<CliffDrop>, ConfigError> {
    validate_drop_threshold(threshold)?;
    let Some(points) = series.points(metric) else { return Ok(vec![]) };

    let drops: Vec<CliffDrop> = (1..points.len())
        .filter_map(|i| {
            let (prev, cur) = (points.values[i - 1], points.values[i]);
            if prev <= 0.0 { return None; }
            let drop_ratio = 1.0 - cur / prev;
            (drop_ratio > threshold).then(|| CliffDrop {
                date:                  points.dates[i],
                metric:                metric.to_string(),
                observed_value:        cur,
                reference_value:       prev,
                drop_ratio,
                bot_purge_probability: (drop_ratio * 100.0).min(MAX_PURGE_PROBABILITY),
            })
        })
        .collect();

    debug!("cliff_drop channel={} metric={} drops={}", series.channel_id(), metric, drops.len());
    Ok(drops)
}
