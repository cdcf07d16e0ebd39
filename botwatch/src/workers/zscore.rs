// botwatch/src/workers/zscore.rs
//
// Rolling z-score outliers.
//
// Trailing mean and sample std over `window` points (min_periods = 1, the
// current point included). The +1 in the denominator keeps near-constant
// series from producing huge z-scores on tiny deviations. A single-sample
// window has no std and never flags.

use tracing::debug;

use crate::config::{AnomalyParams, ConfigError};
use crate::events::Anomaly;
use crate::state::series::TimeSeries;
use crate::state::window;

const MAX_CONFIDENCE: f64 = 95.0;

pub fn detect_anomalies(series: &TimeSeries, metric: &str, params: &AnomalyParams) -> Result<Vec<Anomaly>, ConfigError> {
    params.validate()?;
    let Some(points) = series.points(metric) else { return Ok(vec![]) };

    let means = window::rolling_mean(&points.values, params.window);
    let stds  = window::rolling_std(&points.values, params.window);

    let anomalies: Vec<Anomaly> = points.values.iter().enumerate()
        .filter_map(|(i, &v)| {
            let (mean, std) = (means[i]?, stds[i]?);
            let z = (v - mean).abs() / (std + 1.0);
            (z > params.z_threshold).then(|| Anomaly {
                date:            points.dates[i],
                metric:          metric.to_string(),
                observed_value:  v,
                reference_value: mean,
                z_score:         z,
                confidence:      (50.0 + z * 5.0).min(MAX_CONFIDENCE),
            })
        })
        .collect();

    debug!("zscore channel={} metric={} anomalies={}", series.channel_id(), metric, anomalies.len());
    Ok(anomalies)
}
