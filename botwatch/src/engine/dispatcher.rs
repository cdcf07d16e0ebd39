// botwatch/src/engine/dispatcher.rs
//
// Writes analysis output under the output directory:
//   reports.jsonl     one ChannelReport per line
//   audit_log.jsonl   one line per score deduction, for reviewing penalties
//   comparison.json   cross-channel result (only when ≥ 2 channels)
// begin_run() truncates all three so repeated runs over the same input
// produce byte-identical files.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::events::{ChannelReport, ComparisonResult, PenaltySource};

const REPORTS:    &str = "reports.jsonl";
const AUDIT_LOG:  &str = "audit_log.jsonl";
const COMPARISON: &str = "comparison.json";

#[derive(Serialize)]
struct AuditEntry<'a> {
    channel_id: &'a str,
    source:     PenaltySource,
    metric:     Option<&'a str>,
    points:     f64,
    reason:     &'a str,
}

pub struct Dispatcher {
    out: PathBuf,
}

impl Dispatcher {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let out: PathBuf = output_dir.into();
        std::fs::create_dir_all(&out)
            .with_context(|| format!("creating output directory {}", out.display()))?;
        Ok(Self { out })
    }

    pub fn output_dir(&self) -> &Path { &self.out }

    pub async fn begin_run(&self) -> Result<()> {
        for file in [REPORTS, AUDIT_LOG, COMPARISON] {
            let path = self.out.join(file);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e).with_context(|| format!("clearing {}", path.display())),
            }
        }
        Ok(())
    }

    pub async fn write_report(&self, report: &ChannelReport) -> Result<()> {
        let line = serde_json::to_string(report)? + "\n";
        self.append(REPORTS, &line).await?;

        let mut audit = String::new();
        for p in &report.authenticity.reasons {
            let entry = AuditEntry {
                channel_id: &report.channel_id,
                source:     p.source,
                metric:     p.metric.as_deref(),
                points:     p.points,
                reason:     &p.reason,
            };
            audit += &(serde_json::to_string(&entry)? + "\n");
        }
        if !audit.is_empty() {
            self.append(AUDIT_LOG, &audit).await?;
        }
        Ok(())
    }

    pub async fn write_comparison(&self, comparison: &ComparisonResult) -> Result<()> {
        let path = self.out.join(COMPARISON);
        let body = serde_json::to_string_pretty(comparison)? + "\n";
        tokio::fs::write(&path, body).await
            .with_context(|| format!("writing {}", path.display()))?;
        info!("comparison written to {}", path.display());
        Ok(())
    }

    async fn append(&self, file: &str, content: &str) -> Result<()> {
        let path = self.out.join(file);
        let mut f = OpenOptions::new().create(true).append(true)
            .open(&path).await
            .with_context(|| format!("opening {}", path.display()))?;
        f.write_all(content.as_bytes()).await?;
        Ok(())
    }
}
