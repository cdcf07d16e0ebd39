// botwatch/src/events.rs
//
// Shared domain types flowing through botwatch: detector events, per-metric
// assessments, the authenticity verdict, cost estimate, the per-channel
// report bundle and cross-channel comparison records.
//
// Everything here is plain data. Detectors produce these values fresh on each
// call and nothing mutates them afterwards.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ── Detector events ───────────────────────────────────────────────────────────

/// Short-duration surge above the rolling median baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spike {
    pub date:                NaiveDate,
    pub metric:              String,
    pub observed_value:      f64,
    pub reference_value:     f64, // rolling median baseline
    pub ratio:               f64,
    pub severity:            u8,  // 1–10
    pub build_days:          u32, // ramp days before the peak plateau
    pub decay_days:          u32, // ramp days after the peak plateau
    pub plateau_days:        u32, // days held within the peak band, peak included
    pub organic_probability: f64, // 0–100
}

/// Sharp single-step decrease: a possible purge of inflated counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliffDrop {
    pub date:                  NaiveDate,
    pub metric:                String,
    pub observed_value:        f64, // value after the drop
    pub reference_value:       f64, // value before the drop
    pub drop_ratio:            f64,
    pub bot_purge_probability: f64, // 0–95
}

/// Rolling z-score outlier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub date:            NaiveDate,
    pub metric:          String,
    pub observed_value:  f64,
    pub reference_value: f64, // rolling mean
    pub z_score:         f64,
    pub confidence:      f64, // 50–95
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Spike(Spike),
    Drop(CliffDrop),
    Anomaly(Anomaly),
}

impl Event {
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::Spike(s)   => s.date,
            Self::Drop(d)    => d.date,
            Self::Anomaly(a) => a.date,
        }
    }

    pub fn metric(&self) -> &str {
        match self {
            Self::Spike(s)   => &s.metric,
            Self::Drop(d)    => &d.metric,
            Self::Anomaly(a) => &a.metric,
        }
    }

    pub fn observed_value(&self) -> f64 {
        match self {
            Self::Spike(s)   => s.observed_value,
            Self::Drop(d)    => d.observed_value,
            Self::Anomaly(a) => a.observed_value,
        }
    }

    pub fn reference_value(&self) -> f64 {
        match self {
            Self::Spike(s)   => s.reference_value,
            Self::Drop(d)    => d.reference_value,
            Self::Anomaly(a) => a.reference_value,
        }
    }

    /// Ratio for spikes and drops, z-score for anomalies.
    pub fn magnitude(&self) -> f64 {
        match self {
            Self::Spike(s)   => s.ratio,
            Self::Drop(d)    => d.drop_ratio,
            Self::Anomaly(a) => a.z_score,
        }
    }

    /// Severity tier for spikes, purge probability for drops, confidence for anomalies.
    pub fn severity(&self) -> f64 {
        match self {
            Self::Spike(s)   => f64::from(s.severity),
            Self::Drop(d)    => d.bot_purge_probability,
            Self::Anomaly(a) => a.confidence,
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spike(s) => write!(
                f, "{} spike {} {:.0} ({:.1}x baseline, severity {})",
                s.date, s.metric, s.observed_value, s.ratio, s.severity
            ),
            Self::Drop(d) => write!(
                f, "{} drop {} -{:.1}% (purge probability {:.0}%)",
                d.date, d.metric, d.drop_ratio * 100.0, d.bot_purge_probability
            ),
            Self::Anomaly(a) => write!(
                f, "{} anomaly {} z={:.2} (confidence {:.0}%)",
                a.date, a.metric, a.z_score, a.confidence
            ),
        }
    }
}

// ── Per-metric assessments ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternClass {
    Natural,
    Warning,
    Rectangular, // flat elevated plateau, injected traffic held constant
}

impl std::fmt::Display for PatternClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Natural     => write!(f, "NATURAL"),
            Self::Warning     => write!(f, "WARNING"),
            Self::Rectangular => write!(f, "RECTANGULAR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateauWindow {
    pub start: NaiveDate,
    pub end:   NaiveDate,
    pub mean:  f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternAssessment {
    pub metric:                   String,
    pub coefficient_of_variation: f64,
    pub classification:           PatternClass,
    pub natural_cov:              f64,
    pub bot_cov:                  f64,
    pub plateau_mean_multiple:    f64,
    pub windows_evaluated:        usize,
    pub plateau:                  Option<PlateauWindow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthProfile {
    pub metric:                 String,
    pub mean_daily_growth_pct:  f64,
    pub std_daily_growth_pct:   f64,
    pub max_daily_growth_pct:   f64,
    pub suspicious_days:        usize, // > 100% day-over-day
    pub impossible_days:        usize, // > 1000% day-over-day
    pub authenticity_score:     f64,   // 0–100 sub-score
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeekdayPattern {
    Natural,
    Suspicious,
    BotPattern,
}

impl std::fmt::Display for WeekdayPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Natural    => write!(f, "NATURAL"),
            Self::Suspicious => write!(f, "SUSPICIOUS"),
            Self::BotPattern => write!(f, "BOT_PATTERN"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekdayProfile {
    pub metric:        String,
    pub weekend_avg:   f64,
    pub weekday_avg:   f64,
    pub weekend_ratio: f64,
    pub pattern:       WeekdayPattern,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngagementLabel {
    Organic,
    BotInflation, // conversion far above organic range
    ViewBotting,  // conversion far below organic range
    Suspicious,
    #[default]
    Unknown,
}

impl std::fmt::Display for EngagementLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Organic      => write!(f, "ORGANIC"),
            Self::BotInflation => write!(f, "BOT_INFLATION"),
            Self::ViewBotting  => write!(f, "VIEW_BOTTING"),
            Self::Suspicious   => write!(f, "SUSPICIOUS"),
            Self::Unknown      => write!(f, "UNKNOWN"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EngagementAssessment {
    pub conversion_rate_pct: Option<f64>,
    pub label:               EngagementLabel,
    pub confidence:          f64,
    pub total_views:         f64,
    pub total_subscribers:   f64,
}

/// Everything the workers found for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Findings {
    pub metrics:    Vec<String>,
    pub spikes:     Vec<Spike>,
    pub drops:      Vec<CliffDrop>,
    pub anomalies:  Vec<Anomaly>,
    pub patterns:   BTreeMap<String, PatternAssessment>,
    pub growth:     BTreeMap<String, GrowthProfile>,
    pub weekday:    BTreeMap<String, WeekdayProfile>,
    pub engagement: EngagementAssessment,
}

impl Findings {
    /// All events merged in date order (spikes, then drops, then anomalies on ties).
    pub fn events(&self) -> Vec<Event> {
        let mut events: Vec<Event> = self.spikes.iter().cloned().map(Event::Spike)
            .chain(self.drops.iter().cloned().map(Event::Drop))
            .chain(self.anomalies.iter().cloned().map(Event::Anomaly))
            .collect();
        events.sort_by_key(Event::date);
        events
    }
}

// ── Verdict ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rating {
    HeavilyBotted,
    LikelyBotted,
    Questionable,
    MostlyAuthentic,
    Authentic,
    InsufficientData,
}

impl Rating {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0      { Self::Authentic }
        else if score >= 70.0 { Self::MostlyAuthentic }
        else if score >= 50.0 { Self::Questionable }
        else if score >= 30.0 { Self::LikelyBotted }
        else                  { Self::HeavilyBotted }
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentic        => write!(f, "AUTHENTIC"),
            Self::MostlyAuthentic  => write!(f, "MOSTLY_AUTHENTIC"),
            Self::Questionable     => write!(f, "QUESTIONABLE"),
            Self::LikelyBotted     => write!(f, "LIKELY_BOTTED"),
            Self::HeavilyBotted    => write!(f, "HEAVILY_BOTTED"),
            Self::InsufficientData => write!(f, "INSUFFICIENT_DATA"),
        }
    }
}

/// Which analysis produced a score deduction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PenaltySource {
    Spikes,
    Engagement,
    Growth,
    TimePattern,
    Rectangular,
    Reference,
}

impl std::fmt::Display for PenaltySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spikes      => write!(f, "spikes"),
            Self::Engagement  => write!(f, "engagement"),
            Self::Growth      => write!(f, "growth"),
            Self::TimePattern => write!(f, "time_pattern"),
            Self::Rectangular => write!(f, "rectangular"),
            Self::Reference   => write!(f, "reference"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Penalty {
    pub source: PenaltySource,
    pub metric: Option<String>,
    pub points: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticityResult {
    pub score:                Option<f64>, // None only for insufficient data
    pub raw_score:            Option<f64>, // before the [0, 100] clamp
    pub rating:               Rating,
    pub reasons:              Vec<Penalty>,
    pub reference_similarity: Option<f64>,
}

impl AuthenticityResult {
    pub fn insufficient_data() -> Self {
        Self {
            score:                None,
            raw_score:            None,
            rating:               Rating::InsufficientData,
            reasons:              vec![],
            reference_similarity: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CostEstimate {
    pub excess_views:       f64,
    pub excess_subscribers: f64,
    pub min_cost:           f64,
    pub max_cost:           f64,
    pub average_cost:       f64,
}

// ── Channel report bundle ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Complete,
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelReport {
    pub channel_id:   String,
    pub status:       AnalysisStatus,
    pub observations: usize,
    #[serde(flatten)]
    pub findings:     Findings,
    pub authenticity: AuthenticityResult,
    pub cost:         CostEstimate,
}

impl ChannelReport {
    pub fn score(&self) -> Option<f64> { self.authenticity.score }

    pub fn to_jsonl(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ── Cross-channel comparison ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynchronizedEvent {
    pub channel_a:              String,
    pub channel_b:              String,
    pub date_a:                 NaiveDate,
    pub date_b:                 NaiveDate,
    pub days_apart:             i64,
    pub correlation_confidence: f64,
    pub metrics_a:              Vec<String>,
    pub metrics_b:              Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityScore {
    pub channel_a:          String,
    pub channel_b:          String,
    pub score:              f64,
    pub likely_same_vendor: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSignature {
    pub channel_id:       String,
    pub score:            Option<f64>,
    pub spike_count:      usize,
    pub drop_count:       usize,
    pub anomaly_count:    usize,
    pub engagement_label: EngagementLabel,
    pub average_cost:     f64,
    pub signature_hash:   String, // SHA256[:8] over (spikes, drops, engagement label)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorCluster {
    pub cluster_id: u32,
    pub channels:   Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AggregateStats {
    pub total_estimated_cost:   f64,
    pub average_authenticity:   Option<f64>,
    pub channels_likely_botted: usize,
    pub insights:               Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ComparisonResult {
    pub channels:        Vec<String>,
    pub synchronized:    Vec<SynchronizedEvent>,
    pub similarities:    Vec<SimilarityScore>,
    pub signatures:      Vec<ChannelSignature>,
    pub vendor_clusters: Vec<VendorCluster>,
    pub aggregate:       AggregateStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_thresholds() {
        assert_eq!(Rating::from_score(100.0), Rating::Authentic);
        assert_eq!(Rating::from_score(90.0),  Rating::Authentic);
        assert_eq!(Rating::from_score(89.9),  Rating::MostlyAuthentic);
        assert_eq!(Rating::from_score(50.0),  Rating::Questionable);
        assert_eq!(Rating::from_score(30.0),  Rating::LikelyBotted);
        assert_eq!(Rating::from_score(0.0),   Rating::HeavilyBotted);
    }

    #[test]
    fn events_merge_in_date_order() {
        let d = |n| NaiveDate::from_ymd_opt(2024, 1, n).unwrap();
        let findings = Findings {
            drops: vec![CliffDrop {
                date: d(5), metric: "Views".into(), observed_value: 10.0,
                reference_value: 100.0, drop_ratio: 0.9, bot_purge_probability: 90.0,
            }],
            anomalies: vec![Anomaly {
                date: d(2), metric: "Views".into(), observed_value: 500.0,
                reference_value: 100.0, z_score: 4.0, confidence: 70.0,
            }],
            ..Default::default()
        };
        let events = findings.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].date(), d(2));
        assert_eq!(events[1].magnitude(), 0.9);
    }
}
