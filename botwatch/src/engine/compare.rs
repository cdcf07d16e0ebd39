// botwatch/src/engine/compare.rs
//
// Cross-channel comparison: synchronized spikes, pairwise signature
// similarity, vendor clusters and aggregate stats.
//
// Every channel pair is compared (i < j in report order). Channels sharing a
// bot vendor tend to spike within a day or two of each other and leave
// similar fingerprints: the same engagement label, comparable spike and drop
// counts, and close authenticity scores.
//
// Similarity (0–100):
//   +30  engagement labels equal (UNKNOWN matches UNKNOWN)
//   +20  spike counts within 3
//   +20  drop counts within 3
//   +30  both scores defined and within 15
// Pairs at or above vendor_similarity_threshold are linked; vendor clusters
// are the connected components of those links with two or more members.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use petgraph::unionfind::UnionFind;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::config::DetectionConfig;
use crate::events::{
    AggregateStats, ChannelReport, ChannelSignature, ComparisonResult, SimilarityScore,
    SynchronizedEvent, VendorCluster,
};

const COUNT_TOLERANCE: usize = 3;
const SCORE_TOLERANCE: f64   = 15.0;
const LOW_AUTHENTICITY: f64  = 50.0;
const HIGH_TOTAL_COST: f64   = 10_000.0;

/// Distinct spike dates of a channel, each with the metrics that spiked.
fn spike_dates(report: &ChannelReport) -> BTreeMap<NaiveDate, BTreeSet<String>> {
    let mut dates: BTreeMap<NaiveDate, BTreeSet<String>> = BTreeMap::new();
    for s in &report.findings.spikes {
        dates.entry(s.date).or_default().insert(s.metric.clone());
    }
    dates
}

pub fn find_synchronized_events(a: &ChannelReport, b: &ChannelReport, tolerance_days: i64) -> Vec<SynchronizedEvent> {
    let (dates_a, dates_b) = (spike_dates(a), spike_dates(b));
    let mut events = Vec::new();
    for (da, ma) in &dates_a {
        for (db, mb) in &dates_b {
            let days_apart = (*db - *da).num_days().abs();
            if days_apart > tolerance_days { continue; }
            events.push(SynchronizedEvent {
                channel_a:              a.channel_id.clone(),
                channel_b:              b.channel_id.clone(),
                date_a:                 *da,
                date_b:                 *db,
                days_apart,
                correlation_confidence: (95.0 - 10.0 * days_apart as f64).max(0.0),
                metrics_a:              ma.iter().cloned().collect(),
                metrics_b:              mb.iter().cloned().collect(),
            });
        }
    }
    events
}

pub fn similarity(a: &ChannelReport, b: &ChannelReport) -> f64 {
    let (fa, fb) = (&a.findings, &b.findings);
    let mut score = 0.0;
    if fa.engagement.label == fb.engagement.label { score += 30.0; }
    if fa.spikes.len().abs_diff(fb.spikes.len()) <= COUNT_TOLERANCE { score += 20.0; }
    if fa.drops.len().abs_diff(fb.drops.len()) <= COUNT_TOLERANCE { score += 20.0; }
    if let (Some(sa), Some(sb)) = (a.score(), b.score()) {
        if (sa - sb).abs() <= SCORE_TOLERANCE { score += 30.0; }
    }
    score
}

/// First 8 hex chars of SHA-256 over (spike count, drop count, engagement label).
pub fn signature_hash(report: &ChannelReport) -> String {
    let f = &report.findings;
    let mut h = Sha256::new();
    h.update((f.spikes.len() as u64).to_le_bytes());
    h.update((f.drops.len() as u64).to_le_bytes());
    h.update(f.engagement.label.to_string().as_bytes());
    let mut digest = hex::encode(h.finalize());
    digest.truncate(8);
    digest
}

pub fn signature(report: &ChannelReport) -> ChannelSignature {
    ChannelSignature {
        channel_id:       report.channel_id.clone(),
        score:            report.score(),
        spike_count:      report.findings.spikes.len(),
        drop_count:       report.findings.drops.len(),
        anomaly_count:    report.findings.anomalies.len(),
        engagement_label: report.findings.engagement.label,
        average_cost:     report.cost.average_cost,
        signature_hash:   signature_hash(report),
    }
}

pub fn vendor_clusters(channels: &[String], similarities: &[SimilarityScore]) -> Vec<VendorCluster> {
    let index: BTreeMap<&str, usize> = channels.iter().enumerate().map(|(i, c)| (c.as_str(), i)).collect();
    let mut uf = UnionFind::<usize>::new(channels.len());
    for s in similarities.iter().filter(|s| s.likely_same_vendor) {
        if let (Some(&a), Some(&b)) = (index.get(s.channel_a.as_str()), index.get(s.channel_b.as_str())) {
            uf.union(a, b);
        }
    }

    // Group by representative, clusters ordered by their first member.
    let mut groups: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    let mut first_of: BTreeMap<usize, usize> = BTreeMap::new();
    for (i, c) in channels.iter().enumerate() {
        let root = uf.find(i);
        let first = *first_of.entry(root).or_insert(i);
        groups.entry(first).or_default().push(c.clone());
    }

    groups.into_values()
        .filter(|members| members.len() >= 2)
        .enumerate()
        .map(|(i, channels)| VendorCluster { cluster_id: i as u32, channels })
        .collect()
}

fn aggregate(reports: &[ChannelReport], synchronized: usize, vendor_pairs: usize) -> AggregateStats {
    let total_estimated_cost: f64 = reports.iter().map(|r| r.cost.average_cost).sum();
    let scores: Vec<f64> = reports.iter().filter_map(ChannelReport::score).collect();
    let average_authenticity = (!scores.is_empty()).then(|| scores.iter().sum::<f64>() / scores.len() as f64);
    let channels_likely_botted = scores.iter().filter(|&&s| s < LOW_AUTHENTICITY).count();

    let mut insights = Vec::new();
    if synchronized > 0 {
        insights.push(format!("Found {synchronized} synchronized spike events, likely a shared bot vendor"));
    }
    if total_estimated_cost > HIGH_TOTAL_COST {
        insights.push(format!("Total estimated manipulation cost across channels: ${total_estimated_cost:.2}"));
    }
    if let Some(avg) = average_authenticity.filter(|&a| a < LOW_AUTHENTICITY) {
        insights.push(format!("Low average authenticity score ({avg:.1}/100), significant bot activity detected"));
    }
    if vendor_pairs > 0 {
        insights.push(format!("{vendor_pairs} channel pairs show highly similar bot patterns"));
    }

    AggregateStats { total_estimated_cost, average_authenticity, channels_likely_botted, insights }
}

pub fn compare(reports: &[ChannelReport], config: &DetectionConfig) -> ComparisonResult {
    let channels: Vec<String> = reports.iter().map(|r| r.channel_id.clone()).collect();
    let mut synchronized = Vec::new();
    let mut similarities = Vec::new();

    for (i, a) in reports.iter().enumerate() {
        for b in &reports[i + 1..] {
            synchronized.extend(find_synchronized_events(a, b, config.sync_tolerance_days));
            let score = similarity(a, b);
            similarities.push(SimilarityScore {
                channel_a:          a.channel_id.clone(),
                channel_b:          b.channel_id.clone(),
                score,
                likely_same_vendor: score >= config.vendor_similarity_threshold,
            });
        }
    }

    let vendor_clusters = vendor_clusters(&channels, &similarities);
    let vendor_pairs    = similarities.iter().filter(|s| s.likely_same_vendor).count();
    let aggregate       = aggregate(reports, synchronized.len(), vendor_pairs);

    info!(
        "compare channels={} synchronized={} vendor_pairs={} clusters={}",
        channels.len(), synchronized.len(), vendor_pairs, vendor_clusters.len()
    );

    ComparisonResult {
        signatures: reports.iter().map(signature).collect(),
        channels,
        synchronized,
        similarities,
        vendor_clusters,
        aggregate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{AnalysisStatus, AuthenticityResult, CostEstimate, Findings, Rating, Spike};

    fn day(d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(2024, 10, d).unwrap() }

    fn report(id: &str, spike_days: &[u32], score: Option<f64>) -> ChannelReport {
        let spikes = spike_days.iter().map(|&d| Spike {
            date: day(d), metric: "Views".into(), observed_value: 9000.0, reference_value: 1000.0,
            ratio: 9.0, severity: 5, build_days: 0, decay_days: 0, plateau_days: 1, organic_probability: 10.0,
        }).collect();
        ChannelReport {
            channel_id:   id.into(),
            status:       AnalysisStatus::Complete,
            observations: 30,
            findings:     Findings { spikes, ..Default::default() },
            authenticity: AuthenticityResult {
                score, raw_score: score, rating: score.map_or(Rating::InsufficientData, Rating::from_score),
                reasons: vec![], reference_similarity: None,
            },
            cost: CostEstimate { average_cost: 6000.0, ..Default::default() },
        }
    }

    #[test]
    fn one_day_apart_is_85() {
        let ev = find_synchronized_events(&report("a", &[10], None), &report("b", &[11], None), 2);
        assert_eq!(ev.len(), 1);
        assert_eq!(ev[0].days_apart, 1);
        assert_eq!(ev[0].correlation_confidence, 85.0);
    }

    #[test]
    fn outside_tolerance_is_ignored() {
        let ev = find_synchronized_events(&report("a", &[1], None), &report("b", &[4], None), 2);
        assert!(ev.is_empty());
    }

    #[test]
    fn similarity_needs_both_scores() {
        let a = report("a", &[1], Some(60.0));
        assert_eq!(similarity(&a, &report("b", &[2], Some(70.0))), 100.0);
        assert_eq!(similarity(&a, &report("c", &[2], None)), 70.0);
    }

    #[test]
    fn clusters_are_connected_components() {
        let channels: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let link = |a: &str, b: &str, same| SimilarityScore {
            channel_a: a.into(), channel_b: b.into(), score: 0.0, likely_same_vendor: same,
        };
        let sims = [link("a", "c", true), link("c", "d", true), link("a", "b", false)];
        let clusters = vendor_clusters(&channels, &sims);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].channels, vec!["a", "c", "d"]);
    }

    #[test]
    fn signature_hash_is_stable_and_short() {
        let a = report("a", &[1, 2], None);
        let b = report("b", &[5, 9], Some(10.0));
        assert_eq!(signature_hash(&a).len(), 8);
        assert_eq!(signature_hash(&a), signature_hash(&b));
    }

    #[test]
    fn compare_covers_every_pair() {
        let reports = [report("a", &[10], Some(20.0)), report("b", &[11], Some(25.0)), report("c", &[20], Some(90.0))];
        let r = compare(&reports, &DetectionConfig::default());
        assert_eq!(r.similarities.len(), 3);
        assert_eq!(r.synchronized.len(), 1);
        assert_eq!(r.vendor_clusters.len(), 1);
        assert_eq!(r.aggregate.channels_likely_botted, 2);
        assert_eq!(r.aggregate.total_estimated_cost, 18_000.0);
        assert_eq!(r.aggregate.insights.len(), 4);
    }
}
