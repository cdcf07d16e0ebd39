pub mod compare;
pub mod cost;
pub mod dispatcher;
pub mod fusion;
pub mod reference;

use tracing::{debug, info};

use crate::config::{ConfigError, DetectionConfig};
use crate::events::{AnalysisStatus, AuthenticityResult, ChannelReport, CostEstimate, Findings};
use crate::state::series::TimeSeries;
use crate::workers;

use fusion::AuthenticityScorer;
use reference::ReferenceProfile;

/// Full single-channel pipeline: detectors → scorer → cost.
/// A pure function of its inputs; a channel with no finite values reports
/// InsufficientData with no score instead of a misleading 100.
pub fn analyze_channel(
    series:    &TimeSeries,
    config:    &DetectionConfig,
    reference: Option<&ReferenceProfile>,
) -> Result<ChannelReport, ConfigError> {
    config.validate()?;

    if !series.has_data() {
        debug!("channel={} has no finite values", series.channel_id());
        return Ok(ChannelReport {
            channel_id:   series.channel_id().to_string(),
            status:       AnalysisStatus::InsufficientData,
            observations: series.len(),
            findings:     Findings::default(),
            authenticity: AuthenticityResult::insufficient_data(),
            cost:         CostEstimate::default(),
        });
    }

    let findings     = workers::run_all(series, config)?;
    let authenticity = AuthenticityScorer::new(config, reference).score(&findings);
    let cost = cost::estimate_cost(
        cost::excess_volume(&findings.spikes, &config.views_metric),
        cost::excess_volume(&findings.spikes, &config.subscribers_metric),
        &config.cost,
    );

    info!(
        "channel={} spikes={} drops={} anomalies={} score={:.1} rating={}",
        series.channel_id(), findings.spikes.len(), findings.drops.len(), findings.anomalies.len(),
        authenticity.score.unwrap_or_default(), authenticity.rating,
    );

    Ok(ChannelReport {
        channel_id:   series.channel_id().to_string(),
        status:       AnalysisStatus::Complete,
        observations: series.len(),
        findings,
        authenticity,
        cost,
    })
}
