// botwatch/src/lib.rs
//
// botwatch — engagement-inflation detection over channel time series.
//
// Layering, leaf to root:
//   state    TimeSeries + rolling window statistics
//   workers  independent per-metric detectors (spike, drop, z-score, pattern,
//            growth, weekday, engagement)
//   engine   scoring, cost, reference calibration, cross-channel comparison,
//            the analyze_channel pipeline and the output writer
//   service  cache-aware wrapper used by the CLI and eval harness

pub mod cache;
pub mod config;
pub mod engine;
pub mod eval;
pub mod events;
pub mod ingest;
pub mod service;
pub mod state;
pub mod workers;

pub use config::{ConfigError, DetectionConfig, Preset};
pub use engine::analyze_channel;
pub use events::{AuthenticityResult, ChannelReport, ComparisonResult, Rating};
pub use state::series::{Observation, TimeSeries};
