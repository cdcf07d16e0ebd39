pub mod baseline;
pub mod cliff_drop;
pub mod engagement;
pub mod growth;
pub mod pattern;
pub mod spike;
pub mod time_pattern;
pub mod zscore;

use crate::config::{ConfigError, DetectionConfig};
use crate::events::Findings;
use crate::state::series::TimeSeries;

/// Run every detector over every analyzed metric of one channel.
/// Metrics the series lacks contribute nothing; detectors never see each
/// other's output.
pub fn run_all(series: &TimeSeries, config: &DetectionConfig) -> Result<Findings, ConfigError> {
    let spike_params   = config.spike_params();
    let anomaly_params = config.anomaly_params();
    let metrics        = config.metrics_for(series);

    let mut findings = Findings { metrics: metrics.clone(), ..Default::default() };

    for metric in &metrics {
        findings.spikes.extend(spike::detect_spikes(series, metric, &spike_params)?);
        findings.drops.extend(cliff_drop::detect_drops(series, metric, config.drop_threshold)?);
        findings.anomalies.extend(zscore::detect_anomalies(series, metric, &anomaly_params)?);

        if let Some(p) = pattern::classify_pattern(series, metric, config.pattern_window, &config.pattern)? {
            findings.patterns.insert(metric.clone(), p);
        }
        if let Some(g) = growth::analyze_growth(series, metric, &config.growth)? {
            findings.growth.insert(metric.clone(), g);
        }
        if let Some(w) = time_pattern::analyze_weekday(series, metric, &config.weekday)? {
            findings.weekday.insert(metric.clone(), w);
        }
    }

    findings.engagement = engagement::analyze_engagement(
        series, &config.views_metric, &config.subscribers_metric, &config.engagement,
    )?;
    Ok(findings)
}
