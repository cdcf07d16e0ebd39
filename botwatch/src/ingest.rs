// botwatch/src/ingest.rs
//
// Normalized JSONL input → per-channel TimeSeries.
//
// One row per channel-day:
//   {"channel_id": "chan-a", "date": "2024-10-18", "metrics": {"Views": 1234.0, "Subscribers": null}}
// Null metrics are absent values. Rows are grouped per channel and sorted by
// date; a channel with two rows for the same date is skipped with a warning
// and the rest of the file still loads. Malformed lines are skipped the same
// way.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, warn};

use crate::events::ChannelReport;
use crate::state::series::{Observation, SeriesError, TimeSeries};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Row {
    pub channel_id: String,
    pub date:       NaiveDate,
    #[serde(default)]
    pub metrics:    BTreeMap<String, Option<f64>>,
}

impl Row {
    fn into_observation(self) -> Observation {
        let metrics = self.metrics.into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect();
        Observation { date: self.date, metrics }
    }
}

/// Parse JSONL text. Returns the rows and the number of skipped lines.
pub fn parse_rows(text: &str) -> (Vec<Row>, usize) {
    let mut rows    = Vec::new();
    let mut skipped = 0;
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() { continue; }
        match serde_json::from_str::<Row>(line) {
            Ok(row) => rows.push(row),
            Err(e)  => { warn!("line {}: parse error: {}", n + 1, e); skipped += 1; }
        }
    }
    (rows, skipped)
}

/// Group rows per channel (sorted by channel id), each sorted by date.
pub fn group_rows(rows: Vec<Row>) -> Vec<Result<TimeSeries, SeriesError>> {
    let mut by_channel: BTreeMap<String, Vec<Observation>> = BTreeMap::new();
    for row in rows {
        by_channel.entry(row.channel_id.clone()).or_default().push(row.into_observation());
    }
    by_channel.into_iter()
        .map(|(channel, mut obs)| {
            obs.sort_by_key(|o| o.date);
            TimeSeries::new(channel, obs)
        })
        .collect()
}

/// Load every valid channel from a JSONL file.
pub async fn load_series(path: &Path) -> Result<Vec<TimeSeries>> {
    let text = tokio::fs::read_to_string(path).await
        .with_context(|| format!("reading {}", path.display()))?;
    let (rows, skipped) = parse_rows(&text);

    let mut series = Vec::new();
    for result in group_rows(rows) {
        match result {
            Ok(s)  => series.push(s),
            Err(e) => warn!("skipping channel: {}", e),
        }
    }
    info!("loaded {} channels from {} ({} lines skipped)", series.len(), path.display(), skipped);
    Ok(series)
}

/// Read a reports.jsonl written by an earlier run (used for reference profiles).
pub async fn load_reports(path: &Path) -> Result<Vec<ChannelReport>> {
    let text = tokio::fs::read_to_string(path).await
        .with_context(|| format!("reading {}", path.display()))?;
    text.lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(n, l)| {
            serde_json::from_str::<ChannelReport>(l)
                .with_context(|| format!("{}:{}: invalid report", path.display(), n + 1))
        })
        .collect()
}
