use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use log2::warn;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::report::CrawlReport;

/// One persisted run. Never modified once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub report: CrawlReport,
}

impl RunRecord {
    pub fn new(report: CrawlReport) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            report,
        }
    }

    /// 404 pages found across all sites of the run
    pub fn error_count(&self) -> usize {
        self.report.summary.total_errors
    }
}

/// Append-only store of crawl runs
pub trait HistoryStore {
    /// Assigns an id and a timestamp to `report` and persists it
    fn record(&self, report: &CrawlReport) -> Result<RunRecord>;

    /// Runs recorded in `[from, to)`, oldest first
    fn runs_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<RunRecord>>;
}

/// Records `report` on the blocking thread pool so file I/O never stalls
/// the runtime.
pub async fn record_blocking<S>(store: Arc<S>, report: CrawlReport) -> Result<RunRecord>
where
    S: HistoryStore + Send + Sync + 'static,
{
    tokio::task::spawn_blocking(move || store.record(&report))
        .await
        .context("history writer panicked")?
}

/// [`HistoryStore::runs_between`] on the blocking thread pool
pub async fn runs_between_blocking<S>(store: Arc<S>, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<RunRecord>>
where
    S: HistoryStore + Send + Sync + 'static,
{
    tokio::task::spawn_blocking(move || store.runs_between(from, to))
        .await
        .context("history reader panicked")?
}

/// History kept as one JSON document per line
pub struct JsonlHistory {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<RunRecord>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("Failed to open {}", self.path.display())),
        };

        let mut records = Vec::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read {}", self.path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RunRecord>(&line) {
                Ok(record) => records.push(record),
                // a torn last line must not hide the rest of the history
                Err(e) => warn!("Skipping line {} of {}: {}", number + 1, self.path.display(), e),
            }
        }
        Ok(records)
    }
}

impl HistoryStore for JsonlHistory {
    fn record(&self, report: &CrawlReport) -> Result<RunRecord> {
        let record = RunRecord::new(report.clone());
        let line = serde_json::to_string(&record)?;

        let _guard = self.write_lock.lock().map_err(|_| anyhow!("history lock poisoned"))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        writeln!(file, "{}", line)?;

        Ok(record)
    }

    fn runs_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<RunRecord>> {
        let mut records: Vec<RunRecord> = self
            .load()?
            .into_iter()
            .filter(|r| r.recorded_at >= from && r.recorded_at < to)
            .collect();
        records.sort_by_key(|r| r.recorded_at);
        Ok(records)
    }
}
