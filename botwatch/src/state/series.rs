// botwatch/src/state/series.rs
//
// Per-channel engagement series.
//
// A TimeSeries is built once from normalized input and never mutated. Every
// detector reads it through MetricPoints, which carries only the observations
// that hold a finite value for the requested metric:
//   - gaps stay gaps (a missing day is absent, not zero)
//   - NaN / inf values are dropped at extraction time
//   - dates remain strictly increasing, so day distances are always positive

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Observation ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date:    NaiveDate,
    pub metrics: BTreeMap<String, f64>,
}

impl Observation {
    pub fn new(date: NaiveDate) -> Self {
        Self { date, metrics: BTreeMap::new() }
    }

    /// Builder-style metric insert, used heavily by tests and the loader.
    pub fn with(mut self, metric: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(metric.into(), value);
        self
    }

    /// Finite value for `metric`, if any.
    pub fn get(&self, metric: &str) -> Option<f64> {
        self.metrics.get(metric).copied().filter(|v| v.is_finite())
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SeriesError {
    #[error("channel {channel}: observation dated {date} precedes {previous}")]
    OutOfOrder { channel: String, date: NaiveDate, previous: NaiveDate },

    #[error("channel {channel}: duplicate observation for {date}")]
    DuplicateDate { channel: String, date: NaiveDate },
}

// ── TimeSeries ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    channel_id:   String,
    observations: Vec<Observation>,
}

impl TimeSeries {
    /// Validates strict date ordering. Callers holding unsorted rows should
    /// sort first (see `ingest::group_rows`).
    pub fn new(channel_id: impl Into<String>, observations: Vec<Observation>) -> Result<Self, SeriesError> {
        let channel_id = channel_id.into();
        for pair in observations.windows(2) {
            let (prev, cur) = (pair[0].date, pair[1].date);
            if cur == prev {
                return Err(SeriesError::DuplicateDate { channel: channel_id, date: cur });
            }
            if cur < prev {
                return Err(SeriesError::OutOfOrder { channel: channel_id, date: cur, previous: prev });
            }
        }
        Ok(Self { channel_id, observations })
    }

    pub fn channel_id(&self) -> &str { &self.channel_id }
    pub fn observations(&self) -> &[Observation] { &self.observations }
    pub fn len(&self) -> usize { self.observations.len() }
    pub fn is_empty(&self) -> bool { self.observations.is_empty() }

    /// Metrics that carry at least one finite value, in sorted order.
    pub fn metric_names(&self) -> BTreeSet<String> {
        self.observations.iter()
            .flat_map(|o| o.metrics.iter())
            .filter(|(_, v)| v.is_finite())
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// True when at least one observation holds a finite metric value.
    pub fn has_data(&self) -> bool {
        self.observations.iter().any(|o| o.metrics.values().any(|v| v.is_finite()))
    }

    /// Present points for `metric`. None when the metric never appears.
    pub fn points(&self, metric: &str) -> Option<MetricPoints> {
        let (dates, values): (Vec<NaiveDate>, Vec<f64>) = self.observations.iter()
            .filter_map(|o| o.get(metric).map(|v| (o.date, v)))
            .unzip();
        if values.is_empty() {
            return None;
        }
        Some(MetricPoints { metric: metric.to_string(), dates, values })
    }
}

// ── MetricPoints ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoints {
    pub metric: String,
    pub dates:  Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl MetricPoints {
    pub fn len(&self) -> usize { self.values.len() }
    pub fn is_empty(&self) -> bool { self.values.is_empty() }

    pub fn sum(&self) -> f64 { self.values.iter().sum() }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() { 0.0 } else { self.sum() / self.values.len() as f64 }
    }

    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Calendar days from point `a` to point `b` (negative when b precedes a).
    pub fn days_between(&self, a: usize, b: usize) -> i64 {
        (self.dates[b] - self.dates[a]).num_days()
    }
}
