use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::history::RunRecord;

/// How runs are grouped into points of the trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bucketing {
    /// One point per calendar day (UTC)
    Daily,
    /// One point per recorded run
    PerRun,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionPoint {
    pub bucket: DateTime<Utc>,
    pub run_count: usize,
    pub avg_errors: f64,
    pub min_errors: usize,
    pub max_errors: usize,
    pub avg_duration_secs: f64,
}

impl EvolutionPoint {
    fn from_runs(bucket: DateTime<Utc>, runs: &[&RunRecord]) -> Self {
        let run_count = runs.len();
        let errors: Vec<usize> = runs.iter().map(|r| r.error_count()).collect();
        let total_errors: usize = errors.iter().sum();
        let total_duration: f64 = runs.iter().map(|r| r.report.duration_secs).sum();

        Self {
            bucket,
            run_count,
            avg_errors: total_errors as f64 / run_count as f64,
            min_errors: errors.iter().copied().min().unwrap_or(0),
            max_errors: errors.iter().copied().max().unwrap_or(0),
            avg_duration_secs: total_duration / run_count as f64,
        }
    }
}

fn bucket_start(recorded_at: DateTime<Utc>, mode: Bucketing) -> DateTime<Utc> {
    match mode {
        Bucketing::PerRun => recorded_at,
        Bucketing::Daily => recorded_at
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|midnight| midnight.and_utc())
            .unwrap_or(recorded_at),
    }
}

/// Groups the runs recorded in `[from, to)` into a time-ordered series
pub fn evolution(
    records: &[RunRecord],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    mode: Bucketing,
) -> Vec<EvolutionPoint> {
    let mut buckets: BTreeMap<(DateTime<Utc>, usize), Vec<&RunRecord>> = BTreeMap::new();

    for (index, record) in records.iter().enumerate() {
        if record.recorded_at < from || record.recorded_at >= to {
            continue;
        }
        // two runs recorded in the same instant are still two points
        let key = match mode {
            Bucketing::Daily => (bucket_start(record.recorded_at, mode), 0),
            Bucketing::PerRun => (record.recorded_at, index),
        };
        buckets.entry(key).or_default().push(record);
    }

    buckets
        .into_iter()
        .map(|((bucket, _), runs)| EvolutionPoint::from_runs(bucket, &runs))
        .collect()
}

pub fn print_evolution(points: &[EvolutionPoint]) {
    println!(
        "{:<26} {:>6} {:>10} {:>6} {:>6} {:>12}",
        "BUCKET", "RUNS", "AVG 404s", "MIN", "MAX", "AVG SECONDS"
    );
    println!("{}", "=".repeat(72));
    for point in points {
        println!(
            "{:<26} {:>6} {:>10.1} {:>6} {:>6} {:>12.1}",
            point.bucket.format("%Y-%m-%d %H:%M:%S"),
            point.run_count,
            point.avg_errors,
            point.min_errors,
            point.max_errors,
            point.avg_duration_secs
        );
    }
}
