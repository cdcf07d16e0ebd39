// botwatch/src/eval/mod.rs
//
// Labeled evaluation harness.
//
// Runs the full pipeline over a channel dataset and scores the verdicts
// against known labels:
//   1. Loads the normalized JSONL dataset (same format as analyze mode)
//   2. Loads labels: a JSON object mapping channel_id → true (known inflated)
//      or false (organic)
//   3. Predicts "inflated" when a channel's score < threshold
//   4. Computes precision / recall / F1 / FPR overall and per penalty source
//      (a source "fires" on a channel when it deducted any points)
//
// Channels without a label are analyzed but left out of the metrics. A
// channel with insufficient data has no score and is predicted organic.
//
// Run:
//   botwatch --mode eval --path labeled.jsonl --labels labels.json
//   botwatch --mode eval --path labeled.jsonl --labels labels.json --eval-threshold 60

pub mod report;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cache::ReportCache;
use crate::events::{ChannelReport, PenaltySource};
use crate::ingest;
use crate::service::AnalysisService;

// ── Confusion counters ────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConfusionCounts {
    pub tp:  u64, // true positive
    pub fp:  u64, // false positive
    pub tn:  u64, // true negative
    pub fn_: u64, // false negative
}

impl ConfusionCounts {
    pub fn record(&mut self, predicted: bool, actual: bool) {
        match (predicted, actual) {
            (true,  true)  => self.tp  += 1,
            (true,  false) => self.fp  += 1,
            (false, true)  => self.fn_ += 1,
            (false, false) => self.tn  += 1,
        }
    }

    pub fn precision(&self) -> f64 {
        let denom = self.tp + self.fp;
        if denom == 0 { 1.0 } else { self.tp as f64 / denom as f64 }
    }

    pub fn recall(&self) -> f64 {
        let denom = self.tp + self.fn_;
        if denom == 0 { 0.0 } else { self.tp as f64 / denom as f64 }
    }

    pub fn f1(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) }
    }

    pub fn fpr(&self) -> f64 {
        let denom = self.fp + self.tn;
        if denom == 0 { 0.0 } else { self.fp as f64 / denom as f64 }
    }
}

// ── Aggregate evaluation result ───────────────────────────────────────────────

#[derive(Debug)]
pub struct EvalResult {
    pub n_channels:      usize,
    pub n_positive:      usize, // labeled inflated
    pub n_negative:      usize, // labeled organic
    pub n_unlabeled:     usize,
    pub threshold:       f64,
    pub global:          ConfusionCounts,
    pub per_source:      BTreeMap<PenaltySource, ConfusionCounts>,
    pub rating_counts:   BTreeMap<String, u64>,
    pub score_histogram: Vec<(f64, usize)>,       // (bin lower bound, count), 10-point bins
    pub scored:          Vec<(Option<f64>, bool)>, // (score, label) per labeled channel
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

pub struct Evaluator {
    threshold: f64,
}

impl Evaluator {
    pub fn new(threshold: f64) -> Self { Self { threshold } }

    pub async fn run_dataset<C: ReportCache>(
        &self,
        data:    &Path,
        labels:  &Path,
        service: &AnalysisService<C>,
    ) -> Result<EvalResult> {
        let labels = load_labels(labels).await?;
        let series = ingest::load_series(data).await?;

        let mut reports = Vec::with_capacity(series.len());
        for s in &series {
            reports.push(service.analyze(s)?);
        }
        info!("evaluated {} channels against {} labels", reports.len(), labels.len());
        Ok(self.evaluate(&reports, &labels))
    }

    pub fn evaluate(&self, reports: &[ChannelReport], labels: &BTreeMap<String, bool>) -> EvalResult {
        let mut global        = ConfusionCounts::default();
        let mut per_source: BTreeMap<PenaltySource, ConfusionCounts> = BTreeMap::new();
        let mut rating_counts: BTreeMap<String, u64> = BTreeMap::new();
        let mut score_bins    = vec![0usize; 10];
        let mut scored        = Vec::new();
        let (mut n_positive, mut n_negative, mut n_unlabeled) = (0, 0, 0);

        for report in reports {
            let Some(&actual) = labels.get(&report.channel_id) else {
                n_unlabeled += 1;
                continue;
            };
            if actual { n_positive += 1 } else { n_negative += 1 }

            let score     = report.score();
            let predicted = score.is_some_and(|s| s < self.threshold);
            global.record(predicted, actual);

            for source in ALL_SOURCES {
                let fired = report.authenticity.reasons.iter().any(|p| p.source == source);
                per_source.entry(source).or_default().record(fired, actual);
            }

            *rating_counts.entry(report.authenticity.rating.to_string()).or_default() += 1;
            if let Some(s) = score {
                score_bins[((s / 10.0) as usize).min(9)] += 1;
            }
            scored.push((score, actual));
        }

        for label in labels.keys() {
            if !reports.iter().any(|r| &r.channel_id == label) {
                warn!("label for {} has no matching channel", label);
            }
        }

        EvalResult {
            n_channels: n_positive + n_negative,
            n_positive,
            n_negative,
            n_unlabeled,
            threshold: self.threshold,
            global,
            per_source,
            rating_counts,
            score_histogram: score_bins.into_iter().enumerate().map(|(i, c)| (i as f64 * 10.0, c)).collect(),
            scored,
        }
    }
}

const ALL_SOURCES: [PenaltySource; 6] = [
    PenaltySource::Spikes,
    PenaltySource::Engagement,
    PenaltySource::Growth,
    PenaltySource::TimePattern,
    PenaltySource::Rectangular,
    PenaltySource::Reference,
];

pub async fn load_labels(path: &Path) -> Result<BTreeMap<String, bool>> {
    let text = tokio::fs::read_to_string(path).await
        .with_context(|| format!("reading labels {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing labels {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{
        AnalysisStatus, AuthenticityResult, CostEstimate, Findings, Penalty, Rating,
    };

    fn report(id: &str, score: Option<f64>, sources: &[PenaltySource]) -> ChannelReport {
        ChannelReport {
            channel_id:   id.into(),
            status:       if score.is_some() { AnalysisStatus::Complete } else { AnalysisStatus::InsufficientData },
            observations: 10,
            findings:     Findings::default(),
            authenticity: AuthenticityResult {
                score,
                raw_score: score,
                rating:    score.map_or(Rating::InsufficientData, Rating::from_score),
                reasons:   sources.iter().map(|&source| Penalty {
                    source, metric: None, points: 10.0, reason: String::new(),
                }).collect(),
                reference_similarity: None,
            },
            cost: CostEstimate::default(),
        }
    }

    #[test]
    fn confusion_counts_and_rates() {
        let reports = [
            report("bot1",  Some(20.0), &[PenaltySource::Spikes, PenaltySource::Rectangular]),
            report("bot2",  Some(70.0), &[PenaltySource::Spikes]),
            report("real1", Some(95.0), &[]),
            report("real2", Some(40.0), &[PenaltySource::Spikes]),
            report("other", Some(10.0), &[]),
        ];
        let labels: BTreeMap<String, bool> = [("bot1", true), ("bot2", true), ("real1", false), ("real2", false)]
            .into_iter().map(|(k, v)| (k.to_string(), v)).collect();

        let r = Evaluator::new(50.0).evaluate(&reports, &labels);
        assert_eq!((r.n_positive, r.n_negative, r.n_unlabeled), (2, 2, 1));
        assert_eq!(r.global, ConfusionCounts { tp: 1, fp: 1, tn: 1, fn_: 1 });
        assert_eq!(r.global.f1(), 0.5);

        let rect = &r.per_source[&PenaltySource::Rectangular];
        assert_eq!(rect.precision(), 1.0);
        assert_eq!(rect.recall(), 0.5);
    }

    #[test]
    fn insufficient_data_is_predicted_organic() {
        let labels = BTreeMap::from([("empty".to_string(), true)]);
        let r = Evaluator::new(50.0).evaluate(&[report("empty", None, &[])], &labels);
        assert_eq!(r.global.fn_, 1);
        assert_eq!(r.rating_counts["INSUFFICIENT_DATA"], 1);
    }
}
