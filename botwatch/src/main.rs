// botwatch/src/main.rs
//
// botwatch — bot-inflation detection for channel engagement series
//
// Four modes:
//   analyze     score every channel in a JSONL dataset, write reports
//   compare     analyze, then print cross-channel synchronization + vendor links
//   eval        score a labeled dataset and report precision / recall / F1
//   thresholds  print the threshold presets
//
// Usage:
//   botwatch --mode analyze --path channels.jsonl --output ./out
//   botwatch --mode compare --path channels.jsonl --preset aggressive
//   botwatch --mode eval --path labeled.jsonl --labels labels.json --json
//   botwatch --mode analyze --path channels.jsonl --reference trusted/reports.jsonl

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use botwatch::cache::TtlCache;
use botwatch::config::{DetectionConfig, Preset};
use botwatch::engine::dispatcher::Dispatcher;
use botwatch::engine::reference::ReferenceProfile;
use botwatch::eval::{self, Evaluator};
use botwatch::events::{AnalysisStatus, ChannelReport, ComparisonResult, Rating};
use botwatch::ingest;
use botwatch::service::AnalysisService;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name    = "botwatch",
    about   = "Bot-inflation detection for channel engagement time series",
    version = env!("CARGO_PKG_VERSION"),
)]
struct Cli {
    #[arg(long, value_enum, default_value = "analyze")]
    mode: Mode,

    #[arg(long, default_value = "channels.jsonl", help = "Normalized JSONL dataset")]
    path: PathBuf,

    #[arg(long, default_value = "/tmp/botwatch_output", help = "Report output directory")]
    output: PathBuf,

    #[arg(long, help = "TOML config file (overrides the preset)")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "moderate")]
    preset: Preset,

    #[arg(long, help = "reports.jsonl of trusted channels used as reference profile")]
    reference: Option<PathBuf>,

    #[arg(long, help = "Labels JSON for eval mode: {\"channel\": true|false}")]
    labels: Option<PathBuf>,

    #[arg(long, default_value = "50.0", help = "Eval: score below this predicts inflation")]
    eval_threshold: f64,

    #[arg(long, help = "Eval: print JSON instead of markdown")]
    json: bool,

    #[arg(long, help = "Override spike_min_ratio")]
    spike_ratio: Option<f64>,

    #[arg(long, help = "Override z_threshold")]
    z_threshold: Option<f64>,

    #[arg(long, help = "Override drop_threshold")]
    drop_threshold: Option<f64>,

    #[arg(long, help = "Override rolling_window")]
    rolling_window: Option<usize>,

    #[arg(long, help = "Override sync_tolerance_days")]
    sync_tolerance: Option<i64>,
}

#[derive(Clone, ValueEnum)]
enum Mode {
    Analyze,    // per-channel reports (+ comparison.json for ≥ 2 channels)
    Compare,    // analyze + cross-channel summary on the terminal
    Eval,       // labeled precision / recall
    Thresholds, // preset table
}

impl Cli {
    fn detection_config(&self) -> Result<DetectionConfig> {
        let mut cfg = DetectionConfig::with_preset(self.preset);
        if let Some(path) = &self.config {
            cfg = DetectionConfig::from_file(path, cfg)?;
        }
        if let Some(v) = self.spike_ratio    { cfg.spike_min_ratio = v; }
        if let Some(v) = self.z_threshold    { cfg.z_threshold = v; }
        if let Some(v) = self.drop_threshold { cfg.drop_threshold = v; }
        if let Some(v) = self.rolling_window { cfg.rolling_window = v; }
        if let Some(v) = self.sync_tolerance { cfg.sync_tolerance_days = v; }
        cfg.validate()?;
        Ok(cfg)
    }
}

// ── Terminal output ───────────────────────────────────────────────────────────

fn print_banner() {
    println!("\x1b[1m  botwatch\x1b[0m \x1b[90mv{}\x1b[0m", env!("CARGO_PKG_VERSION"));
    println!("  \x1b[90mspike, drop and plateau analysis for engagement series\x1b[0m\n");
}

fn print_report(report: &ChannelReport) {
    let (color, icon) = match report.authenticity.rating {
        Rating::Authentic        => ("\x1b[92m",   "🟢"),
        Rating::MostlyAuthentic  => ("\x1b[96m",   "🔵"),
        Rating::Questionable     => ("\x1b[93m",   "🟡"),
        Rating::LikelyBotted     => ("\x1b[93;1m", "🟠"),
        Rating::HeavilyBotted    => ("\x1b[91;1m", "🔴"),
        Rating::InsufficientData => ("\x1b[90m",   "⚪"),
    };
    let reset = "\x1b[0m";

    println!("\n{}{} {} → {}{}", color, icon, report.channel_id, report.authenticity.rating, reset);
    if report.status == AnalysisStatus::InsufficientData {
        println!("  No finite metric values ({} observations)", report.observations);
        return;
    }
    let f = &report.findings;
    println!("  Score   : {}{:.1}{}", color, report.score().unwrap_or_default(), reset);
    println!("  Events  : {} spikes, {} drops, {} anomalies", f.spikes.len(), f.drops.len(), f.anomalies.len());
    println!("  Cost    : ${:.2} – ${:.2}", report.cost.min_cost, report.cost.max_cost);
    for p in report.authenticity.reasons.iter().take(5) {
        println!("  \x1b[90m- {}{}", p.reason, reset);
    }
}

fn print_comparison(c: &ComparisonResult) {
    println!("\n\x1b[1m── cross-channel ──\x1b[0m");
    for s in &c.synchronized {
        println!(
            "  sync  {} {} ↔ {} {}  ({}d, confidence {:.0})",
            s.channel_a, s.date_a, s.channel_b, s.date_b, s.days_apart, s.correlation_confidence
        );
    }
    for v in &c.vendor_clusters {
        println!("  vendor cluster {}: {}", v.cluster_id, v.channels.join(", "));
    }
    for insight in &c.aggregate.insights {
        println!("  \x1b[93m{}\x1b[0m", insight);
    }
}

fn print_thresholds() {
    println!("| preset       | spike ratio | z-score | drop  | notes |");
    println!("|--------------|-------------|---------|-------|-------|");
    for p in [Preset::Conservative, Preset::Moderate, Preset::Aggressive] {
        let c = DetectionConfig::with_preset(p);
        println!(
            "| {:12} | {:11.1} | {:7.1} | {:5.2} | {} |",
            p.to_string(), c.spike_min_ratio, c.z_threshold, c.drop_threshold, p.describe()
        );
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

async fn load_reference(path: Option<&PathBuf>) -> Result<Option<ReferenceProfile>> {
    let Some(path) = path else { return Ok(None) };
    let reports = ingest::load_reports(path).await?;
    let profile = ReferenceProfile::from_reports(&reports)
        .with_context(|| format!("{} contains no reports", path.display()))?;
    info!("reference profile from {} channels", profile.sources.len());
    Ok(Some(profile))
}

/// Analyze every channel on the blocking pool, one task per channel.
/// Reports come back in input (channel id) order.
async fn analyze_all(service: Arc<AnalysisService<TtlCache>>, cli: &Cli) -> Result<Vec<ChannelReport>> {
    let series = ingest::load_series(&cli.path).await?;
    let handles: Vec<_> = series.into_iter()
        .map(|s| {
            let svc = Arc::clone(&service);
            tokio::task::spawn_blocking(move || svc.analyze(&s))
        })
        .collect();

    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        reports.push(handle.await.context("analysis task panicked")??);
    }
    Ok(reports)
}

async fn run_analysis(service: Arc<AnalysisService<TtlCache>>, cli: &Cli, compare_mode: bool) -> Result<()> {
    let dispatcher = Dispatcher::new(cli.output.clone())?;
    dispatcher.begin_run().await?;

    let reports = analyze_all(Arc::clone(&service), cli).await?;
    for report in &reports {
        if let Err(e) = dispatcher.write_report(report).await {
            error!("writing report for {} failed: {}", report.channel_id, e);
        }
        print_report(report);
    }

    if reports.len() >= 2 {
        let comparison = service.compare(&reports);
        dispatcher.write_comparison(&comparison).await?;
        if compare_mode { print_comparison(&comparison); }
    } else if compare_mode {
        bail!("compare mode needs at least two channels, found {}", reports.len());
    }

    println!("\n  Output: \x1b[90m{}\x1b[0m", dispatcher.output_dir().display());
    Ok(())
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env()
            .add_directive("botwatch=info".parse()?))
        .compact().init();

    let cli = Cli::parse();
    if matches!(cli.mode, Mode::Thresholds) {
        print_thresholds();
        return Ok(());
    }

    let config    = cli.detection_config()?;
    let reference = load_reference(cli.reference.as_ref()).await?;
    let service   = Arc::new(AnalysisService::new(config, reference, TtlCache::default())?);

    match cli.mode {
        Mode::Analyze => {
            print_banner();
            run_analysis(service, &cli, false).await?;
        }
        Mode::Compare => {
            print_banner();
            run_analysis(service, &cli, true).await?;
        }
        Mode::Eval => {
            let labels = cli.labels.as_ref().context("eval mode requires --labels")?;
            let result = Evaluator::new(cli.eval_threshold).run_dataset(&cli.path, labels, service.as_ref()).await?;
            if cli.json {
                println!("{}", eval::report::to_json(&result));
            } else {
                eval::report::print_markdown(&result);
            }
        }
        Mode::Thresholds => unreachable!("thresholds mode returns before config loading"),
    }
    Ok(())
}
