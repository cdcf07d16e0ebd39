// botwatch/src/workers/spike.rs
//
// Spike detector — peaks in the value / rolling-median ratio sequence.
//
// Peak selection, in order:
//   1. local maxima (a flat top resolves to its middle sample)
//   2. height      ratio ≥ min_ratio
//   3. separation  peaks closer than min_separation_days (calendar days) are
//                  thinned, the higher one wins and ties keep the earlier date
//   4. prominence  peak − max(left base, right base) ≥ min_prominence
//
// Each surviving peak is then profiled by walking outward: days within the
// plateau band of the peak ratio are plateau days, the following days above
// the ramp floor are build (before) or decay (after) days.

use tracing::debug;

use crate::config::{ConfigError, SpikeParams};
use crate::events::Spike;
use crate::state::series::TimeSeries;
use crate::workers::baseline;

pub fn detect_spikes(series: &TimeSeries, metric: &str, params: &SpikeParams) -> Result<Vec<Spike>, ConfigError> {
    params.validate()?;
    let Some(points) = series.points(metric) else { return Ok(vec![]) };

    let base   = baseline::baseline(&points, params.window)?;
    let ratios = baseline::ratios(&points.values, &base);

    let candidates: Vec<usize> = local_maxima(&ratios).into_iter()
        .filter(|&i| ratios[i] >= params.min_ratio)
        .collect();
    let separated = thin_by_separation(&candidates, &ratios, |a, b| {
        points.days_between(a, b).abs() < params.min_separation_days
    });

    let spikes: Vec<Spike> = separated.into_iter()
        .filter(|&i| prominence(&ratios, i) >= params.min_prominence)
        .map(|i| {
            let ratio = ratios[i];
            let (plateau_before, build) = walk(&ratios, i, Direction::Back, params);
            let (plateau_after, decay)  = walk(&ratios, i, Direction::Forward, params);
            Spike {
                date:                points.dates[i],
                metric:              metric.to_string(),
                observed_value:      points.values[i],
                reference_value:     base[i],
                ratio,
                severity:            severity(ratio),
                build_days:          build,
                decay_days:          decay,
                plateau_days:        1 + plateau_before + plateau_after,
                organic_probability: organic_probability(ratio, build, decay),
            }
        })
        .collect();

    debug!("spike channel={} metric={} spikes={}", series.channel_id(), metric, spikes.len());
    Ok(spikes)
}

/// Severity tier for a peak ratio. Monotonically non-decreasing.
pub fn severity(ratio: f64) -> u8 {
    match ratio {
        r if r >= 100.0 => 10,
        r if r >= 50.0  => 9,
        r if r >= 10.0  => 7,
        r if r >= 5.0   => 5,
        r if r >= 3.0   => 3,
        _               => 1,
    }
}

/// Heuristic chance that a spike is organic: sharp and tall is unlikely.
pub fn organic_probability(ratio: f64, build_days: u32, decay_days: u32) -> f64 {
    let mut p = 100.0;
    if ratio > 10.0     { p -= 40.0; }
    else if ratio > 5.0 { p -= 20.0; }

    if build_days < 2      { p -= 30.0; }
    else if build_days > 7 { p -= 10.0; }

    if decay_days < 2       { p -= 30.0; }
    else if decay_days > 10 { p -= 15.0; }

    f64::clamp(p, 0.0, 100.0)
}

// ── Peak finding ──────────────────────────────────────────────────────────────

fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 { return peaks; }
    let last = x.len() - 1;
    let mut i = 1;
    while i < last {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < last && x[ahead] == x[i] { ahead += 1; }
            if x[ahead] < x[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Highest-first greedy thinning. `too_close(a, b)` decides whether two
/// candidate indices conflict.
fn thin_by_separation(peaks: &[usize], x: &[f64], too_close: impl Fn(usize, usize) -> bool) -> Vec<usize> {
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| x[peaks[b]].total_cmp(&x[peaks[a]]).then(a.cmp(&b)));

    let mut keep = vec![true; peaks.len()];
    for &k in &order {
        if !keep[k] { continue; }
        for j in 0..peaks.len() {
            if j != k && keep[j] && too_close(peaks[k], peaks[j]) {
                keep[j] = false;
            }
        }
    }
    peaks.iter().zip(keep).filter(|(_, k)| *k).map(|(&p, _)| p).collect()
}

fn prominence(x: &[f64], peak: usize) -> f64 {
    let h = x[peak];

    let mut left_min = h;
    for &v in x[..=peak].iter().rev() {
        if v > h { break; }
        left_min = left_min.min(v);
    }
    let mut right_min = h;
    for &v in &x[peak..] {
        if v > h { break; }
        right_min = right_min.min(v);
    }
    h - left_min.max(right_min)
}

// ── Build / decay profile ─────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Direction { Back, Forward }

/// (plateau days, ramp days) on one side of the peak.
fn walk(ratios: &[f64], peak: usize, dir: Direction, params: &SpikeParams) -> (u32, u32) {
    let peak_ratio = ratios[peak];
    let band  = params.plateau_band * peak_ratio;
    let floor = params.ramp_floor * peak_ratio;

    let step = |i: usize| -> Option<usize> {
        match dir {
            Direction::Back    => i.checked_sub(1),
            Direction::Forward => Some(i + 1).filter(|&n| n < ratios.len()),
        }
    };

    let mut plateau = 0;
    let mut cursor  = step(peak);
    while let Some(i) = cursor {
        if ratios[i] < band { break; }
        plateau += 1;
        cursor = step(i);
    }

    let mut ramp = 0;
    while let Some(i) = cursor {
        if ramp >= params.max_walk_days || ratios[i] < floor { break; }
        ramp += 1;
        cursor = step(i);
    }
    (plateau, ramp)
}
