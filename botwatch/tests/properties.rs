// botwatch/tests/properties.rs
//
// Invariants that must hold for any input: tier monotonicity, score bounds,
// cost ordering, baseline robustness and run-to-run determinism.

use chrono::{Days, NaiveDate};
use proptest::prelude::*;

use botwatch::config::{CostRates, DetectionConfig};
use botwatch::engine::analyze_channel;
use botwatch::engine::cost::estimate_cost;
use botwatch::engine::fusion::AuthenticityScorer;
use botwatch::events::{Findings, Spike};
use botwatch::state::series::MetricPoints;
use botwatch::workers::baseline::baseline;
use botwatch::workers::spike::severity;
use botwatch::{Observation, TimeSeries};

fn day(i: u64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Days::new(i)
}

fn spike(i: u64, metric: &str) -> Spike {
    Spike {
        date: day(i), metric: metric.into(), observed_value: 5000.0, reference_value: 1000.0,
        ratio: 5.0, severity: 5, build_days: 0, decay_days: 0, plateau_days: 1,
        organic_probability: 40.0,
    }
}

proptest! {
    #[test]
    fn severity_is_monotonic(a in 0.0f64..500.0, b in 0.0f64..500.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(severity(lo) <= severity(hi));
        prop_assert!((1..=10).contains(&severity(hi)));
    }

    #[test]
    fn score_is_bounded_and_never_rises_with_more_spikes(
        metrics in prop::collection::vec(prop::sample::select(vec!["Views", "Likes", "Comments"]), 0..20),
    ) {
        let cfg    = DetectionConfig::default();
        let scorer = AuthenticityScorer::new(&cfg, None);
        let mut findings = Findings::default();
        let mut previous = 100.0;
        for (i, metric) in metrics.iter().enumerate() {
            findings.spikes.push(spike(i as u64, metric));
            let score = scorer.score(&findings).score.unwrap();
            prop_assert!((0.0..=100.0).contains(&score));
            prop_assert!(score <= previous);
            previous = score;
        }
    }

    #[test]
    fn cost_is_ordered_and_monotonic(
        views in 0.0f64..2e7, subs in 0.0f64..2e5, extra in 0.0f64..1e6,
    ) {
        let rates = CostRates::default();
        let c = estimate_cost(views, subs, &rates);
        prop_assert!(c.min_cost >= 0.0);
        prop_assert!(c.min_cost <= c.average_cost && c.average_cost <= c.max_cost);
        let more = estimate_cost(views + extra, subs, &rates);
        prop_assert!(more.min_cost >= c.min_cost);
        prop_assert!(more.max_cost >= c.max_cost);
    }

    #[test]
    fn one_outlier_does_not_move_the_baseline(
        c in 1.0f64..1e6, len in 5usize..60, at in 2usize..60, outlier in 0.0f64..1e9,
    ) {
        let at = at % len;
        prop_assume!(at >= 2);
        let mut values = vec![c; len];
        values[at] = outlier;
        let points = MetricPoints {
            metric: "Views".into(),
            dates:  (0..len as u64).map(day).collect(),
            values,
        };
        prop_assert!(baseline(&points, 30).unwrap().iter().all(|&b| b == c));
    }

    #[test]
    fn analysis_is_deterministic(values in prop::collection::vec(prop::option::of(0.0f64..1e5), 1..80)) {
        let obs = values.iter().enumerate()
            .map(|(i, v)| {
                let o = Observation::new(day(i as u64));
                match v { Some(v) => o.with("Views", *v), None => o }
            })
            .collect();
        let series = TimeSeries::new("prop", obs).unwrap();
        let cfg    = DetectionConfig::default();
        let first  = analyze_channel(&series, &cfg, None).unwrap();
        let second = analyze_channel(&series, &cfg, None).unwrap();
        prop_assert_eq!(first.to_jsonl().unwrap(), second.to_jsonl().unwrap());
    }
}
