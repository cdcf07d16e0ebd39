// botwatch/src/engine/fusion.rs
//
// Penalty fusion into one 0–100 authenticity score.
//
// Deductions, in the order they are recorded:
//   Spikes       per metric with spikes   min(count × per_spike, spike_cap)
//   Engagement   conversion > 5%          high_conversion
//                conversion < 0.1%        low_conversion
//   Growth       per metric, sub-score < growth_score_floor
//                                         (100 − sub_score) / growth_divisor
//   TimePattern  per metric BOT_PATTERN   time_pattern
//   Rectangular  per RECTANGULAR metric   rectangular
//   Reference    similarity < reference_min_similarity
//                                         reference
//
// Detectors overlap (a rectangular plateau is usually also a spike and a
// growth outlier) and every deduction is kept. raw_score records the sum
// before the [0, 100] clamp so the overlap stays auditable.

use std::collections::BTreeMap;

use crate::config::DetectionConfig;
use crate::engine::reference::ReferenceProfile;
use crate::events::{
    AuthenticityResult, EngagementLabel, Findings, PatternClass, Penalty, PenaltySource, Rating,
    WeekdayPattern,
};

pub struct AuthenticityScorer<'a> {
    config:    &'a DetectionConfig,
    reference: Option<&'a ReferenceProfile>,
}

impl<'a> AuthenticityScorer<'a> {
    pub fn new(config: &'a DetectionConfig, reference: Option<&'a ReferenceProfile>) -> Self {
        Self { config, reference }
    }

    pub fn score(&self, findings: &Findings) -> AuthenticityResult {
        let w = &self.config.penalties;
        let mut reasons = Vec::new();

        // ── Spikes ────────────────────────────────────────────────────────────
        let mut spike_counts: BTreeMap<&str, usize> = BTreeMap::new();
        for s in &findings.spikes {
            *spike_counts.entry(s.metric.as_str()).or_default() += 1;
        }
        for (metric, count) in spike_counts {
            let points = (count as f64 * w.per_spike).min(w.spike_cap);
            reasons.push(penalty(
                PenaltySource::Spikes, Some(metric), points,
                format!("Found {count} suspicious spikes in {metric}"),
            ));
        }

        // ── Engagement ────────────────────────────────────────────────────────
        match findings.engagement.label {
            EngagementLabel::BotInflation => reasons.push(penalty(
                PenaltySource::Engagement, None, w.high_conversion,
                format!("Bot-like engagement pattern: {:.2}% conversion", conversion(findings)),
            )),
            EngagementLabel::ViewBotting => reasons.push(penalty(
                PenaltySource::Engagement, None, w.low_conversion,
                format!("View botting pattern: {:.3}% conversion", conversion(findings)),
            )),
            _ => {}
        }

        // ── Growth ────────────────────────────────────────────────────────────
        for (metric, g) in &findings.growth {
            if g.authenticity_score < w.growth_score_floor {
                let points = (100.0 - g.authenticity_score) / w.growth_divisor;
                reasons.push(penalty(
                    PenaltySource::Growth, Some(metric), points,
                    format!(
                        "Unnatural growth in {metric} ({} suspicious, {} impossible days)",
                        g.suspicious_days, g.impossible_days
                    ),
                ));
            }
        }

        // ── Weekday pattern ───────────────────────────────────────────────────
        for (metric, p) in &findings.weekday {
            if p.pattern == WeekdayPattern::BotPattern {
                reasons.push(penalty(
                    PenaltySource::TimePattern, Some(metric), w.time_pattern,
                    format!("Bot time pattern in {metric}: weekend/weekday ratio {:.2}", p.weekend_ratio),
                ));
            }
        }

        // ── Rectangular plateaus ──────────────────────────────────────────────
        for (metric, p) in &findings.patterns {
            if p.classification == PatternClass::Rectangular {
                reasons.push(penalty(
                    PenaltySource::Rectangular, Some(metric), w.rectangular,
                    format!("Rectangular plateau in {metric} (CoV {:.3})", p.coefficient_of_variation),
                ));
            }
        }

        // ── Reference calibration ─────────────────────────────────────────────
        let reference_similarity = self.reference.map(|r| r.similarity(findings));
        if let Some(sim) = reference_similarity {
            if sim < w.reference_min_similarity {
                reasons.push(penalty(
                    PenaltySource::Reference, None, w.reference,
                    format!("Event shape far from reference profile (similarity {sim:.1})"),
                ));
            }
        }

        let raw   = 100.0 - reasons.iter().map(|p| p.points).sum::<f64>();
        let score = raw.clamp(0.0, 100.0);

        AuthenticityResult {
            score:     Some(score),
            raw_score: Some(raw),
            rating:    Rating::from_score(score),
            reasons,
            reference_similarity,
        }
    }
}

fn penalty(source: PenaltySource, metric: Option<&str>, points: f64, reason: String) -> Penalty {
    Penalty {
        source,
        metric: metric.map(str::to_string),
        points,
        reason: format!("{reason} (-{points:.1} points)"),
    }
}

fn conversion(f: &Findings) -> f64 {
    f.engagement.conversion_rate_pct.unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EngagementAssessment, GrowthProfile, Spike, WeekdayProfile};
    use chrono::{Days, NaiveDate};

    fn spikes(metric: &str, n: usize) -> Vec<Spike> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n).map(|i| Spike {
            date: start + Days::new(i as u64 * 10), metric: metric.into(),
            observed_value: 5000.0, reference_value: 1000.0, ratio: 5.0, severity: 5,
            build_days: 0, decay_days: 0, plateau_days: 1, organic_probability: 10.0,
        }).collect()
    }

    fn score(f: &Findings) -> AuthenticityResult {
        AuthenticityScorer::new(&DetectionConfig::default(), None).score(f)
    }

    #[test]
    fn clean_findings_are_authentic() {
        let r = score(&Findings::default());
        assert_eq!(r.score, Some(100.0));
        assert_eq!(r.rating, Rating::Authentic);
        assert!(r.reasons.is_empty());
    }

    #[test]
    fn spike_penalty_caps_per_metric() {
        let mut f = Findings::default();
        f.spikes.extend(spikes("Views", 9));
        f.spikes.extend(spikes("Subscribers", 2));
        let r = score(&f);
        assert_eq!(r.score, Some(60.0)); // 30 + 10
        assert_eq!(r.reasons[0].metric.as_deref(), Some("Subscribers"));
        assert!(r.reasons[1].reason.contains("-30.0 points"));
    }

    #[test]
    fn engagement_bands_deduct() {
        let f = Findings {
            engagement: EngagementAssessment {
                conversion_rate_pct: Some(8.0), label: EngagementLabel::BotInflation,
                confidence: 90.0, total_views: 1000.0, total_subscribers: 80.0,
            },
            ..Default::default()
        };
        assert_eq!(score(&f).score, Some(75.0));
    }

    #[test]
    fn growth_and_weekday_penalties() {
        let mut f = Findings::default();
        f.growth.insert("Views".into(), GrowthProfile {
            metric: "Views".into(), mean_daily_growth_pct: 0.0, std_daily_growth_pct: 0.0,
            max_daily_growth_pct: 5000.0, suspicious_days: 3, impossible_days: 3, authenticity_score: 40.0,
        });
        f.weekday.insert("Views".into(), WeekdayProfile {
            metric: "Views".into(), weekend_avg: 500.0, weekday_avg: 100.0,
            weekend_ratio: 5.0, pattern: WeekdayPattern::BotPattern,
        });
        let r = score(&f);
        assert_eq!(r.score, Some(75.0)); // 15 + 10
        assert_eq!(r.reasons[0].source, PenaltySource::Growth);
        assert_eq!(r.reasons[1].source, PenaltySource::TimePattern);
    }

    #[test]
    fn clamp_keeps_raw_score() {
        let mut f = Findings::default();
        for m in ["A", "B", "C", "D"] { f.spikes.extend(spikes(m, 6)); }
        let r = score(&f);
        assert_eq!(r.score, Some(0.0));
        assert_eq!(r.raw_score, Some(-20.0));
        assert_eq!(r.rating, Rating::HeavilyBotted);
    }
}
