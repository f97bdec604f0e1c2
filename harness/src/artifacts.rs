//! Persists execution reports as timestamped JSON files.

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};

use crate::scenario::ExecutionReport;

/// Writes reports under a base directory, one JSON file per execution.
#[derive(Debug, Clone)]
pub struct ArtifactCollector {
    base_dir: PathBuf,
}

impl ArtifactCollector {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Save `report` as `<scenario>_<UTC timestamp>.json` and return the path.
    pub async fn save_report(&self, report: &ExecutionReport) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.base_dir)
            .await
            .with_context(|| format!("creating {}", self.base_dir.display()))?;

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let filename = format!("{}_{}.json", slug(&report.scenario_name), timestamp);
        let path = self.base_dir.join(filename);

        let json = serde_json::to_string_pretty(report).context("serializing report")?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("writing {}", path.display()))?;

        log::info!("Saved execution report to {}", path.display());
        Ok(path)
    }

    pub async fn load_report(&self, path: impl AsRef<Path>) -> Result<ExecutionReport> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))
    }

    /// Paths of every saved report, sorted by filename.
    pub async fn list_reports(&self) -> Result<Vec<PathBuf>> {
        let mut reports = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.base_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(reports),
            Err(err) => {
                return Err(err).with_context(|| format!("listing {}", self.base_dir.display()))
            }
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                reports.push(path);
            }
        }
        reports.sort();
        Ok(reports)
    }
}

/// Lowercase the scenario name and squash anything non-alphanumeric so it
/// is safe in a filename.
fn slug(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}
