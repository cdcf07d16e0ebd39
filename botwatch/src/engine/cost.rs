// botwatch/src/engine/cost.rs
//
// Market-rate estimate of what the excess engagement would cost to buy.
// Excess is the volume above baseline on spike days only; inputs are clamped
// to [0, cap] before pricing so one absurd spike cannot dominate.

use crate::config::CostRates;
use crate::events::{CostEstimate, Spike};

pub fn estimate_cost(excess_views: f64, excess_subscribers: f64, rates: &CostRates) -> CostEstimate {
    let views = clamp_volume(excess_views, rates.max_excess_views);
    let subs  = clamp_volume(excess_subscribers, rates.max_excess_subscribers);

    let min_cost = views / 1000.0 * rates.cost_rate_per_1000_views_min
                 + subs / 100.0 * rates.cost_rate_per_100_subs_min;
    let max_cost = views / 1000.0 * rates.cost_rate_per_1000_views_max
                 + subs / 100.0 * rates.cost_rate_per_100_subs_max;

    CostEstimate {
        excess_views:       views,
        excess_subscribers: subs,
        min_cost,
        max_cost,
        average_cost:       (min_cost + max_cost) / 2.0,
    }
}

/// Σ max(0, value − baseline) over spikes on `metric`.
pub fn excess_volume(spikes: &[Spike], metric: &str) -> f64 {
    spikes.iter()
        .filter(|s| s.metric == metric)
        .map(|s| (s.observed_value - s.reference_value).max(0.0))
        .sum()
}

fn clamp_volume(v: f64, cap: f64) -> f64 {
    if v.is_finite() { v.clamp(0.0, cap) } else if v > 0.0 { cap } else { 0.0 }
}
