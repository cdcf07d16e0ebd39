// botwatch/src/engine/reference.rs
//
// Calibration profile built from channels known to be organic.
//
// The scorer can compare a channel's findings against this profile and deduct
// points when the shape of its events is far from the trusted shape. The
// profile is data: it is loaded from earlier reports, never keyed on a
// channel name.
//
// Component similarities (each clamped to [0, 100], then averaged):
//   amplitude   100 − |Δ mean spike ratio| × 10
//   build       100 − |Δ mean build days| × 20
//   conversion  100 − |Δ conversion %| × 20
//   plateau     100 when neither side has rectangular metrics, else
//               100 − |Δ rectangular count| × 30
// A component applies only when both sides define it; with none the
// similarity is a neutral 50.

use serde::{Deserialize, Serialize};

use crate::events::{ChannelReport, Findings, PatternClass};

const NEUTRAL_SIMILARITY: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProfileFeatures {
    pub mean_spike_ratio:    Option<f64>,
    pub mean_build_days:     Option<f64>,
    pub rectangular_metrics: Option<f64>,
    pub conversion_rate_pct: Option<f64>,
}

impl ProfileFeatures {
    pub fn from_findings(f: &Findings) -> Self {
        let n = f.spikes.len() as f64;
        let (mean_spike_ratio, mean_build_days) = if f.spikes.is_empty() {
            (None, None)
        } else {
            (
                Some(f.spikes.iter().map(|s| s.ratio).sum::<f64>() / n),
                Some(f.spikes.iter().map(|s| f64::from(s.build_days)).sum::<f64>() / n),
            )
        };
        let rectangular_metrics = (!f.patterns.is_empty()).then(|| {
            f.patterns.values().filter(|p| p.classification == PatternClass::Rectangular).count() as f64
        });
        Self {
            mean_spike_ratio,
            mean_build_days,
            rectangular_metrics,
            conversion_rate_pct: f.engagement.conversion_rate_pct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceProfile {
    pub sources:  Vec<String>,
    pub features: ProfileFeatures,
}

impl ReferenceProfile {
    /// Average the features of trusted reports. None for an empty slice.
    pub fn from_reports(reports: &[ChannelReport]) -> Option<Self> {
        if reports.is_empty() { return None; }
        let each: Vec<ProfileFeatures> = reports.iter()
            .map(|r| ProfileFeatures::from_findings(&r.findings))
            .collect();
        let avg = |get: fn(&ProfileFeatures) -> Option<f64>| -> Option<f64> {
            let vals: Vec<f64> = each.iter().filter_map(get).collect();
            (!vals.is_empty()).then(|| vals.iter().sum::<f64>() / vals.len() as f64)
        };
        Some(Self {
            sources:  reports.iter().map(|r| r.channel_id.clone()).collect(),
            features: ProfileFeatures {
                mean_spike_ratio:    avg(|f| f.mean_spike_ratio),
                mean_build_days:     avg(|f| f.mean_build_days),
                rectangular_metrics: avg(|f| f.rectangular_metrics),
                conversion_rate_pct: avg(|f| f.conversion_rate_pct),
            },
        })
    }

    pub fn similarity(&self, findings: &Findings) -> f64 {
        let cand = ProfileFeatures::from_findings(findings);
        let refp = &self.features;

        let mut components = Vec::with_capacity(4);
        if let (Some(a), Some(b)) = (refp.mean_spike_ratio, cand.mean_spike_ratio) {
            components.push(100.0 - (a - b).abs() * 10.0);
        }
        if let (Some(a), Some(b)) = (refp.mean_build_days, cand.mean_build_days) {
            components.push(100.0 - (a - b).abs() * 20.0);
        }
        if let (Some(a), Some(b)) = (refp.conversion_rate_pct, cand.conversion_rate_pct) {
            components.push(100.0 - (a - b).abs() * 20.0);
        }
        if let (Some(a), Some(b)) = (refp.rectangular_metrics, cand.rectangular_metrics) {
            components.push(if a == 0.0 && b == 0.0 { 100.0 } else { 100.0 - (a - b).abs() * 30.0 });
        }

        if components.is_empty() { return NEUTRAL_SIMILARITY; }
        components.iter().map(|c| c.clamp(0.0, 100.0)).sum::<f64>() / components.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{PatternAssessment, Spike};
    use chrono::NaiveDate;

    fn spike(ratio: f64, build: u32) -> Spike {
        Spike {
            date: NaiveDate::from_ymd_opt(2024, 9, 14).unwrap(), metric: "Views".into(),
            observed_value: ratio * 1000.0, reference_value: 1000.0, ratio,
            severity: crate::workers::spike::severity(ratio), build_days: build, decay_days: 3,
            plateau_days: 2, organic_probability: 100.0,
        }
    }

    fn pattern(class: PatternClass) -> PatternAssessment {
        PatternAssessment {
            metric: "Views".into(), coefficient_of_variation: 0.4, classification: class,
            natural_cov: 0.3, bot_cov: 0.1, plateau_mean_multiple: 2.0, windows_evaluated: 10, plateau: None,
        }
    }

    fn findings(spikes: Vec<Spike>, class: PatternClass) -> Findings {
        let mut f = Findings { spikes, ..Default::default() };
        f.patterns.insert("Views".into(), pattern(class));
        f
    }

    fn profile(f: Findings) -> ReferenceProfile {
        ReferenceProfile { sources: vec!["trusted".into()], features: ProfileFeatures::from_findings(&f) }
    }

    #[test]
    fn identical_shape_is_fully_similar() {
        let f = findings(vec![spike(3.5, 3)], PatternClass::Natural);
        assert_eq!(profile(f.clone()).similarity(&f), 100.0);
    }

    #[test]
    fn sharp_rectangular_spike_is_dissimilar() {
        let reference = profile(findings(vec![spike(3.5, 3)], PatternClass::Natural));
        let botted    = findings(vec![spike(10.1, 0)], PatternClass::Rectangular);
        // amplitude 34, build 40, plateau 70
        assert!(reference.similarity(&botted) < 50.0);
    }

    #[test]
    fn nothing_comparable_is_neutral() {
        let reference = profile(Findings::default());
        assert_eq!(reference.similarity(&Findings::default()), 50.0);
    }

    #[test]
    fn empty_report_list_has_no_profile() {
        assert!(ReferenceProfile::from_reports(&[]).is_none());
    }
}
