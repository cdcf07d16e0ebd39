// botwatch/src/service.rs
//
// Serving wrapper around the pure pipeline. Owns the validated config, the
// optional reference profile and an injected report cache.

use tracing::debug;

use crate::cache::{CacheKey, ReportCache};
use crate::config::{ConfigError, DetectionConfig};
use crate::engine::{self, compare, reference::ReferenceProfile};
use crate::events::{ChannelReport, ComparisonResult};
use crate::state::series::TimeSeries;

pub struct AnalysisService<C: ReportCache> {
    config:    DetectionConfig,
    reference: Option<ReferenceProfile>,
    cache:     C,
}

impl<C: ReportCache> AnalysisService<C> {
    pub fn new(config: DetectionConfig, reference: Option<ReferenceProfile>, cache: C) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, reference, cache })
    }

    pub fn config(&self) -> &DetectionConfig { &self.config }
    pub fn reference(&self) -> Option<&ReferenceProfile> { self.reference.as_ref() }

    pub fn analyze(&self, series: &TimeSeries) -> Result<ChannelReport, ConfigError> {
        let key = CacheKey::new(series, &self.config, self.reference.as_ref());
        if let Some(hit) = self.cache.get(&key) {
            debug!("cache hit channel={} key={}", series.channel_id(), &key.as_str()[..12]);
            return Ok(hit);
        }
        let report = engine::analyze_channel(series, &self.config, self.reference.as_ref())?;
        self.cache.put(key, report.clone());
        Ok(report)
    }

    pub fn compare(&self, reports: &[ChannelReport]) -> ComparisonResult {
        compare::compare(reports, &self.config)
    }

    pub fn clear_cache(&self) { self.cache.clear() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{NoCache, TtlCache};
    use crate::state::series::Observation;
    use chrono::{Days, NaiveDate};

    fn series() -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let obs = (0..20u64)
            .map(|i| Observation::new(start + Days::new(i)).with("Views", 100.0 + i as f64))
            .collect();
        TimeSeries::new("svc", obs).unwrap()
    }

    #[test]
    fn cached_and_uncached_agree() {
        let cached   = AnalysisService::new(DetectionConfig::default(), None, TtlCache::default()).unwrap();
        let uncached = AnalysisService::new(DetectionConfig::default(), None, NoCache).unwrap();
        let s = series();
        let first = cached.analyze(&s).unwrap();
        assert_eq!(first, cached.analyze(&s).unwrap());
        assert_eq!(first, uncached.analyze(&s).unwrap());
    }

    #[test]
    fn rejects_invalid_config() {
        let cfg = DetectionConfig { pattern_window: 0, ..Default::default() };
        assert!(AnalysisService::new(cfg, None, NoCache).is_err());
    }
}
