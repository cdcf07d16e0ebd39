// botwatch/src/eval/report.rs
//
// AUC and markdown/JSON report output for the eval harness.

use serde_json::json;

use super::EvalResult;

/// Exact rank AUC: the probability that a random inflated channel scores
/// lower (less authentic) than a random organic one, ties counting half.
/// Unscored channels rank as fully authentic (100).
pub fn auc_roc(result: &EvalResult) -> f64 {
    let score = |s: Option<f64>| s.unwrap_or(100.0);
    let pos: Vec<f64> = result.scored.iter().filter(|(_, l)| *l).map(|(s, _)| score(*s)).collect();
    let neg: Vec<f64> = result.scored.iter().filter(|(_, l)| !*l).map(|(s, _)| score(*s)).collect();
    if pos.is_empty() || neg.is_empty() { return 0.5; }

    let mut wins = 0.0;
    for p in &pos {
        for n in &neg {
            if p < n { wins += 1.0 } else if p == n { wins += 0.5 }
        }
    }
    wins / (pos.len() * neg.len()) as f64
}

/// Print a markdown-formatted full report to stdout.
pub fn print_markdown(result: &EvalResult) {
    println!("# botwatch Evaluation Report");
    println!();
    println!(
        "**Channels**: {}  **Inflated**: {}  **Organic**: {}  **Unlabeled**: {}  **Threshold**: {:.1}",
        result.n_channels, result.n_positive, result.n_negative, result.n_unlabeled, result.threshold
    );
    println!();
    println!("| Metric    | Value  |");
    println!("|-----------|--------|");
    println!("| Precision | {:.4}  |", result.global.precision());
    println!("| Recall    | {:.4}  |", result.global.recall());
    println!("| F1        | {:.4}  |", result.global.f1());
    println!("| FPR       | {:.4}  |", result.global.fpr());
    println!("| AUC-ROC   | {:.4}  |", auc_roc(result));
    println!();

    println!("## Per-Source Performance\n");
    println!("| Source | P | R | F1 | FPR |");
    println!("|--------|---|---|----|-----|");
    let mut sources: Vec<_> = result.per_source.iter().collect();
    sources.sort_by(|a, b| b.1.f1().total_cmp(&a.1.f1()));
    for (source, m) in sources {
        println!("| {:12} | {:.3} | {:.3} | {:.3} | {:.4} |",
            source.to_string(), m.precision(), m.recall(), m.f1(), m.fpr());
    }

    println!("\n## Ratings\n");
    for (rating, count) in &result.rating_counts {
        println!("- {rating}: {count}");
    }

    println!("\n## Score Distribution\n");
    let total = result.n_channels.max(1) as f64;
    for (lower, count) in &result.score_histogram {
        let bar = "#".repeat((*count as f64 / total * 60.0) as usize);
        println!("{:>3.0}–{:<3.0} | {:5} | {}", lower, lower + 10.0, count, bar);
    }
}

/// Serialize the evaluation result to JSON for downstream consumption.
pub fn to_json(result: &EvalResult) -> String {
    let per_source: serde_json::Map<String, serde_json::Value> = result.per_source.iter()
        .map(|(source, m)| (source.to_string(), json!({
            "precision": m.precision(),
            "recall":    m.recall(),
            "f1":        m.f1(),
            "fpr":       m.fpr(),
        })))
        .collect();

    json!({
        "n_channels":    result.n_channels,
        "n_positive":    result.n_positive,
        "n_negative":    result.n_negative,
        "n_unlabeled":   result.n_unlabeled,
        "threshold":     result.threshold,
        "precision":     result.global.precision(),
        "recall":        result.global.recall(),
        "f1":            result.global.f1(),
        "fpr":           result.global.fpr(),
        "auc_roc":       auc_roc(result),
        "per_source":    per_source,
        "rating_counts": result.rating_counts,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{ConfusionCounts, EvalResult};
    use std::collections::BTreeMap;

    fn result(scored: Vec<(Option<f64>, bool)>) -> EvalResult {
        EvalResult {
            n_channels: scored.len(), n_positive: 0, n_negative: 0, n_unlabeled: 0,
            threshold: 50.0, global: ConfusionCounts::default(), per_source: BTreeMap::new(),
            rating_counts: BTreeMap::new(), score_histogram: vec![], scored,
        }
    }

    #[test]
    fn perfect_separation_is_one() {
        let r = result(vec![(Some(10.0), true), (Some(20.0), true), (Some(90.0), false)]);
        assert_eq!(auc_roc(&r), 1.0);
    }

    #[test]
    fn ties_count_half() {
        let r = result(vec![(Some(50.0), true), (None, false), (Some(50.0), false)]);
        assert_eq!(auc_roc(&r), 0.75);
    }

    #[test]
    fn json_has_headline_metrics() {
        let v: serde_json::Value = serde_json::from_str(&to_json(&result(vec![]))).unwrap();
        assert_eq!(v["auc_roc"], 0.5);
        assert!(v.get("f1").is_some());
    }
}
