// botwatch/src/cache.rs
//
// Report cache owned by the serving layer, never by the detectors.
//
// Keys are SHA-256 over the serialized (series, config, reference) triple, so
// any change to input data or thresholds misses. Entries expire after the TTL.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::DetectionConfig;
use crate::engine::reference::ReferenceProfile;
use crate::events::ChannelReport;
use crate::state::series::TimeSeries;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(series: &TimeSeries, config: &DetectionConfig, reference: Option<&ReferenceProfile>) -> Self {
        #[derive(Serialize)]
        struct Keyed<'a> {
            series:    &'a TimeSeries,
            config:    &'a DetectionConfig,
            reference: Option<&'a ReferenceProfile>,
        }
        // string-keyed maps and plain structs only; serde_json cannot fail on these
        let bytes = serde_json::to_vec(&Keyed { series, config, reference })
            .expect("series, config and reference serialize to JSON");
        Self(hex::encode(Sha256::digest(&bytes)))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

pub trait ReportCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<ChannelReport>;
    fn put(&self, key: CacheKey, report: ChannelReport);
    fn clear(&self);
}

/// Disabled cache: every lookup misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl ReportCache for NoCache {
    fn get(&self, _key: &CacheKey) -> Option<ChannelReport> { None }
    fn put(&self, _key: CacheKey, _report: ChannelReport) {}
    fn clear(&self) {}
}

pub struct TtlCache {
    ttl:     Duration,
    entries: DashMap<CacheKey, (DateTime<Utc>, ChannelReport)>,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: DashMap::new() }
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn get_at(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<ChannelReport> {
        let expired = {
            let entry = self.entries.get(key)?;
            let (stored, report) = entry.value();
            if now - *stored < self.ttl { return Some(report.clone()); }
            true
        };
        if expired { self.entries.remove(key); }
        None
    }

    pub fn put_at(&self, key: CacheKey, report: ChannelReport, now: DateTime<Utc>) {
        self.entries.retain(|_, (stored, _)| now - *stored < self.ttl);
        self.entries.insert(key, (now, report));
    }
}

impl Default for TtlCache {
    fn default() -> Self { Self::new(Duration::hours(1)) }
}

impl ReportCache for TtlCache {
    fn get(&self, key: &CacheKey) -> Option<ChannelReport> { self.get_at(key, Utc::now()) }
    fn put(&self, key: CacheKey, report: ChannelReport) { self.put_at(key, report, Utc::now()) }
    fn clear(&self) { self.entries.clear() }
}
