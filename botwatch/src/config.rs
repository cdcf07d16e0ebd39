// botwatch/src/config.rs
//
// Detection thresholds, penalty weights and cost rates.
//
// DetectionConfig is deserialized from TOML with every field optional
// (missing fields take the moderate defaults). Resolution order in the CLI:
//   preset → config file → individual flag overrides → validate()
//
// Every detector entry point validates the parameter slice it consumes, so a
// hand-built config that was never passed through validate() still cannot
// reach the math with a zero window or a negative threshold.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::series::TimeSeries;

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to read config {}: {source}", .path.display())]
    Read { path: PathBuf, #[source] source: std::io::Error },

    #[error("failed to parse config {}: {source}", .path.display())]
    Parse { path: PathBuf, #[source] source: toml::de::Error },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field, reason: reason.into() }
}

fn finite(field: &'static str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() { Ok(()) } else { Err(invalid(field, format!("{v} is not finite"))) }
}

fn non_negative(field: &'static str, v: f64) -> Result<(), ConfigError> {
    finite(field, v)?;
    if v < 0.0 { return Err(invalid(field, format!("{v} is negative"))); }
    Ok(())
}

fn positive(field: &'static str, v: f64) -> Result<(), ConfigError> {
    finite(field, v)?;
    if v <= 0.0 { return Err(invalid(field, format!("{v} must be > 0"))); }
    Ok(())
}

fn unit_interval(field: &'static str, v: f64) -> Result<(), ConfigError> {
    finite(field, v)?;
    if !(0.0..=1.0).contains(&v) { return Err(invalid(field, format!("{v} is outside [0, 1]"))); }
    Ok(())
}

fn nonzero(field: &'static str, v: usize) -> Result<(), ConfigError> {
    if v == 0 { Err(invalid(field, "must be at least 1")) } else { Ok(()) }
}

fn ordered(field: &'static str, lo: f64, hi: f64) -> Result<(), ConfigError> {
    if lo > hi { Err(invalid(field, format!("min {lo} exceeds max {hi}"))) } else { Ok(()) }
}

// ── Sub-tables ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternThresholds {
    pub natural_cov:           f64, // above → NATURAL
    pub bot_cov:               f64, // below (on an elevated window) → RECTANGULAR
    pub plateau_mean_multiple: f64, // window mean must exceed this × global mean
}

impl Default for PatternThresholds {
    fn default() -> Self {
        Self { natural_cov: 0.3, bot_cov: 0.1, plateau_mean_multiple: 2.0 }
    }
}

impl PatternThresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("pattern.natural_cov", self.natural_cov)?;
        non_negative("pattern.bot_cov", self.bot_cov)?;
        positive("pattern.plateau_mean_multiple", self.plateau_mean_multiple)?;
        ordered("pattern.bot_cov", self.bot_cov, self.natural_cov)
    }
}

/// Market rates for purchased engagement, USD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostRates {
    pub cost_rate_per_1000_views_min: f64,
    pub cost_rate_per_1000_views_max: f64,
    pub cost_rate_per_100_subs_min:   f64,
    pub cost_rate_per_100_subs_max:   f64,
    pub max_excess_views:             f64,
    pub max_excess_subscribers:       f64,
}

impl Default for CostRates {
    fn default() -> Self {
        Self {
            cost_rate_per_1000_views_min: 3.0,
            cost_rate_per_1000_views_max: 10.0,
            cost_rate_per_100_subs_min:   10.0,
            cost_rate_per_100_subs_max:   50.0,
            max_excess_views:             10_000_000.0,
            max_excess_subscribers:       100_000.0,
        }
    }
}

impl CostRates {
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("cost_rate_per_1000_views_min", self.cost_rate_per_1000_views_min)?;
        non_negative("cost_rate_per_1000_views_max", self.cost_rate_per_1000_views_max)?;
        non_negative("cost_rate_per_100_subs_min", self.cost_rate_per_100_subs_min)?;
        non_negative("cost_rate_per_100_subs_max", self.cost_rate_per_100_subs_max)?;
        non_negative("max_excess_views", self.max_excess_views)?;
        non_negative("max_excess_subscribers", self.max_excess_subscribers)?;
        ordered("cost_rate_per_1000_views", self.cost_rate_per_1000_views_min, self.cost_rate_per_1000_views_max)?;
        ordered("cost_rate_per_100_subs", self.cost_rate_per_100_subs_min, self.cost_rate_per_100_subs_max)
    }
}

/// Points deducted by the authenticity scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltyWeights {
    pub per_spike:                f64,
    pub spike_cap:                f64, // per metric
    pub high_conversion:          f64,
    pub low_conversion:           f64,
    pub growth_score_floor:       f64, // growth sub-scores below this are penalized
    pub growth_divisor:           f64,
    pub time_pattern:             f64,
    pub rectangular:              f64,
    pub reference:                f64,
    pub reference_min_similarity: f64,
}

impl Default for PenaltyWeights {
    fn default() -> Self {
        Self {
            per_spike:                5.0,
            spike_cap:                30.0,
            high_conversion:          25.0,
            low_conversion:           20.0,
            growth_score_floor:       50.0,
            growth_divisor:           4.0,
            time_pattern:             10.0,
            rectangular:              30.0,
            reference:                15.0,
            reference_min_similarity: 40.0,
        }
    }
}

impl PenaltyWeights {
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("penalties.per_spike", self.per_spike)?;
        non_negative("penalties.spike_cap", self.spike_cap)?;
        non_negative("penalties.high_conversion", self.high_conversion)?;
        non_negative("penalties.low_conversion", self.low_conversion)?;
        non_negative("penalties.growth_score_floor", self.growth_score_floor)?;
        positive("penalties.growth_divisor", self.growth_divisor)?;
        non_negative("penalties.time_pattern", self.time_pattern)?;
        non_negative("penalties.rectangular", self.rectangular)?;
        non_negative("penalties.reference", self.reference)?;
        non_negative("penalties.reference_min_similarity", self.reference_min_similarity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthThresholds {
    pub suspicious_pct:          f64, // daily growth above this is suspicious
    pub impossible_pct:          f64,
    pub suspicious_days_allowed: usize,
    pub suspicious_day_penalty:  f64,
    pub impossible_day_penalty:  f64,
}

impl Default for GrowthThresholds {
    fn default() -> Self {
        Self {
            suspicious_pct:          100.0,
            impossible_pct:          1000.0,
            suspicious_days_allowed: 5,
            suspicious_day_penalty:  5.0,
            impossible_day_penalty:  20.0,
        }
    }
}

impl GrowthThresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("growth.suspicious_pct", self.suspicious_pct)?;
        non_negative("growth.impossible_pct", self.impossible_pct)?;
        non_negative("growth.suspicious_day_penalty", self.suspicious_day_penalty)?;
        non_negative("growth.impossible_day_penalty", self.impossible_day_penalty)?;
        ordered("growth.suspicious_pct", self.suspicious_pct, self.impossible_pct)
    }
}

/// Weekend / weekday average ratio bands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeekdayThresholds {
    pub natural_low:  f64,
    pub natural_high: f64,
    pub bot_low:      f64,
    pub bot_high:     f64,
}

impl Default for WeekdayThresholds {
    fn default() -> Self {
        Self { natural_low: 0.7, natural_high: 1.3, bot_low: 0.3, bot_high: 3.0 }
    }
}

impl WeekdayThresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("weekday.bot_low", self.bot_low)?;
        finite("weekday.natural_low", self.natural_low)?;
        finite("weekday.natural_high", self.natural_high)?;
        finite("weekday.bot_high", self.bot_high)?;
        ordered("weekday.bot_low", self.bot_low, self.natural_low)?;
        ordered("weekday.natural_low", self.natural_low, self.natural_high)?;
        ordered("weekday.natural_high", self.natural_high, self.bot_high)
    }
}

/// Views → subscribers conversion bands, percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementThresholds {
    pub bot_inflation_pct: f64,
    pub view_botting_pct:  f64,
    pub organic_low_pct:   f64,
    pub organic_high_pct:  f64,
}

impl Default for EngagementThresholds {
    fn default() -> Self {
        Self { bot_inflation_pct: 5.0, view_botting_pct: 0.1, organic_low_pct: 0.5, organic_high_pct: 2.0 }
    }
}

impl EngagementThresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("engagement.view_botting_pct", self.view_botting_pct)?;
        finite("engagement.organic_low_pct", self.organic_low_pct)?;
        finite("engagement.organic_high_pct", self.organic_high_pct)?;
        finite("engagement.bot_inflation_pct", self.bot_inflation_pct)?;
        ordered("engagement.view_botting_pct", self.view_botting_pct, self.organic_low_pct)?;
        ordered("engagement.organic_low_pct", self.organic_low_pct, self.organic_high_pct)?;
        ordered("engagement.organic_high_pct", self.organic_high_pct, self.bot_inflation_pct)
    }
}

// ── Per-detector parameter slices ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SpikeParams {
    pub min_ratio:           f64,
    pub min_prominence:      f64,
    pub min_separation_days: i64,
    pub window:              usize,
    pub max_walk_days:       u32,
    pub plateau_band:        f64, // fraction of peak ratio that counts as plateau
    pub ramp_floor:          f64, // fraction of peak ratio that ends a ramp walk
}

impl Default for SpikeParams {
    fn default() -> Self { DetectionConfig::default().spike_params() }
}

impl SpikeParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("spike_min_ratio", self.min_ratio)?;
        non_negative("spike_min_prominence", self.min_prominence)?;
        if self.min_separation_days < 0 {
            return Err(invalid("spike_min_separation_days", "must not be negative"));
        }
        nonzero("rolling_window", self.window)?;
        unit_interval("spike_plateau_band", self.plateau_band)?;
        unit_interval("spike_ramp_floor", self.ramp_floor)?;
        ordered("spike_ramp_floor", self.ramp_floor, self.plateau_band)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyParams {
    pub window:      usize,
    pub z_threshold: f64,
}

impl Default for AnomalyParams {
    fn default() -> Self { DetectionConfig::default().anomaly_params() }
}

impl AnomalyParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        nonzero("rolling_window", self.window)?;
        non_negative("z_threshold", self.z_threshold)
    }
}

pub fn validate_drop_threshold(threshold: f64) -> Result<(), ConfigError> {
    unit_interval("drop_threshold", threshold)
}

// ── DetectionConfig ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub spike_min_ratio:             f64,
    pub spike_min_prominence:        f64,
    pub spike_min_separation_days:   i64,
    pub spike_max_walk_days:         u32,
    pub spike_plateau_band:          f64,
    pub spike_ramp_floor:            f64,
    pub drop_threshold:              f64,
    pub z_threshold:                 f64,
    pub rolling_window:              usize,
    pub pattern_window:              usize,
    pub sync_tolerance_days:         i64,
    pub vendor_similarity_threshold: f64,
    pub views_metric:                String,
    pub subscribers_metric:          String,
    /// Restrict analysis to these metrics. None analyzes every metric present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics:                     Option<Vec<String>>,
    #[serde(flatten)]
    pub cost:                        CostRates,
    pub pattern:                     PatternThresholds,
    pub penalties:                   PenaltyWeights,
    pub growth:                      GrowthThresholds,
    pub weekday:                     WeekdayThresholds,
    pub engagement:                  EngagementThresholds,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            spike_min_ratio:             3.0,
            spike_min_prominence:        2.0,
            spike_min_separation_days:   7,
            spike_max_walk_days:         7,
            spike_plateau_band:          0.9,
            spike_ramp_floor:            0.5,
            drop_threshold:              0.5,
            z_threshold:                 3.0,
            rolling_window:              30,
            pattern_window:              7,
            sync_tolerance_days:         2,
            vendor_similarity_threshold: 70.0,
            views_metric:                "Views".into(),
            subscribers_metric:          "Subscribers".into(),
            metrics:                     None,
            cost:                        CostRates::default(),
            pattern:                     PatternThresholds::default(),
            penalties:                   PenaltyWeights::default(),
            growth:                      GrowthThresholds::default(),
            weekday:                     WeekdayThresholds::default(),
            engagement:                  EngagementThresholds::default(),
        }
    }
}

impl DetectionConfig {
    /// Defaults when `path` is None, otherwise the TOML file over defaults.
    /// The result is validated either way.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let cfg = match path {
            None    => Self::default(),
            Some(p) => Self::from_file(p, Self::default())?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Overlay a TOML file on `base`: keys present in the file win, absent
    /// keys keep the base value.
    pub fn from_file(path: &Path, base: Self) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let parse_err = |source| ConfigError::Parse { path: path.to_path_buf(), source };

        let overlay: toml::Table = toml::from_str(&text).map_err(parse_err)?;
        let toml::Value::Table(mut merged) = toml::Value::try_from(&base)
            .map_err(|e| invalid("config", e.to_string()))?
        else {
            return Err(invalid("config", "defaults did not serialize to a table"));
        };
        merge_tables(&mut merged, overlay);
        toml::Value::Table(merged).try_into().map_err(parse_err)
    }

    pub fn with_preset(preset: Preset) -> Self {
        let mut cfg = Self::default();
        preset.apply(&mut cfg);
        cfg
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.spike_params().validate()?;
        self.anomaly_params().validate()?;
        validate_drop_threshold(self.drop_threshold)?;
        nonzero("pattern_window", self.pattern_window)?;
        if self.sync_tolerance_days < 0 {
            return Err(invalid("sync_tolerance_days", "must not be negative"));
        }
        non_negative("vendor_similarity_threshold", self.vendor_similarity_threshold)?;
        if self.views_metric.is_empty() { return Err(invalid("views_metric", "must not be empty")); }
        if self.subscribers_metric.is_empty() {
            return Err(invalid("subscribers_metric", "must not be empty"));
        }
        self.cost.validate()?;
        self.pattern.validate()?;
        self.penalties.validate()?;
        self.growth.validate()?;
        self.weekday.validate()?;
        self.engagement.validate()
    }

    pub fn spike_params(&self) -> SpikeParams {
        SpikeParams {
            min_ratio:           self.spike_min_ratio,
            min_prominence:      self.spike_min_prominence,
            min_separation_days: self.spike_min_separation_days,
            window:              self.rolling_window,
            max_walk_days:       self.spike_max_walk_days,
            plateau_band:        self.spike_plateau_band,
            ramp_floor:          self.spike_ramp_floor,
        }
    }

    pub fn anomaly_params(&self) -> AnomalyParams {
        AnomalyParams { window: self.rolling_window, z_threshold: self.z_threshold }
    }

    /// Metrics of `series` to run per-metric detectors on, honoring the allow-list.
    pub fn metrics_for(&self, series: &TimeSeries) -> Vec<String> {
        let present = series.metric_names();
        match &self.metrics {
            None        => present.into_iter().collect(),
            Some(allow) => {
                let allow: BTreeSet<&str> = allow.iter().map(String::as_str).collect();
                present.into_iter().filter(|m| allow.contains(m.as_str())).collect()
            }
        }
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        let value = match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(b)), toml::Value::Table(o)) => { merge_tables(b, o); continue; }
            (_, v) => v,
        };
        base.insert(key, value);
    }
}

// ── Presets ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Conservative, // fewer false positives
    Moderate,     // defaults
    Aggressive,   // catches subtler inflation, noisier
}

impl Preset {
    pub fn apply(self, cfg: &mut DetectionConfig) {
        let (spike, z, drop) = match self {
            Self::Conservative => (5.0, 4.0, 0.7),
            Self::Moderate     => (3.0, 3.0, 0.5),
            Self::Aggressive   => (2.0, 2.0, 0.3),
        };
        cfg.spike_min_ratio = spike;
        cfg.z_threshold     = z;
        cfg.drop_threshold  = drop;
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::Conservative => "few false positives, may miss subtle inflation",
            Self::Moderate     => "balanced detection",
            Self::Aggressive   => "catches subtle inflation, more false positives",
        }
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conservative => write!(f, "conservative"),
            Self::Moderate     => write!(f, "moderate"),
            Self::Aggressive   => write!(f, "aggressive"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        DetectionConfig::default().validate().unwrap();
        for p in [Preset::Conservative, Preset::Moderate, Preset::Aggressive] {
            DetectionConfig::with_preset(p).validate().unwrap();
        }
    }

    #[test]
    fn moderate_preset_matches_defaults() {
        assert_eq!(DetectionConfig::with_preset(Preset::Moderate), DetectionConfig::default());
    }

    #[test]
    fn rejects_zero_window() {
        let cfg = DetectionConfig { rolling_window: 0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid { field: "rolling_window", .. })));
    }

    #[test]
    fn rejects_inverted_rate_range() {
        let mut cfg = DetectionConfig::default();
        cfg.cost.cost_rate_per_1000_views_min = 20.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid { field: "cost_rate_per_1000_views", .. })));
    }

    #[test]
    fn rejects_non_finite_threshold() {
        let cfg = DetectionConfig { z_threshold: f64::NAN, ..Default::default() };
        assert!(cfg.validate().is_err());
        let cfg = DetectionConfig { spike_min_ratio: -1.0, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_non_finite_band() {
        let mut cfg = DetectionConfig::default();
        cfg.weekday.natural_low = f64::NAN;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid { field: "weekday.natural_low", .. })));

        let mut cfg = DetectionConfig::default();
        cfg.engagement.organic_high_pct = f64::NAN;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid { field: "engagement.organic_high_pct", .. })));

        let mut cfg = DetectionConfig::default();
        cfg.weekday.natural_high = f64::INFINITY;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn allow_list_filters_metrics() {
        use crate::state::series::Observation;
        let day = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let series = TimeSeries::new("c", vec![
            Observation::new(day).with("Views", 1.0).with("Likes", 2.0),
        ]).unwrap();
        let cfg = DetectionConfig { metrics: Some(vec!["Views".into(), "Comments".into()]), ..Default::default() };
        assert_eq!(cfg.metrics_for(&series), vec!["Views".to_string()]);
    }
}
