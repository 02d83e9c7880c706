//! JSON output formatting
//!
//! Serializes a finished scan into a single document:
//! - Scan plan (file, unit size, job size, seed, tail policy)
//! - Job counters and latency percentiles
//! - Failed jobs with their units and error
//! - Watchdog observations (when it ran)
//! - The merged analysis result, as an arbitrary JSON value

use crate::analysis::moments::MomentsAccumulator;
use crate::config::TailPolicy;
use crate::scheduler::{FailedJob, ScanReport};
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Duration with both microseconds and human-readable format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonDuration {
    pub micros: u64,
    pub human: String,
}

impl JsonDuration {
    pub fn from_duration(d: Duration) -> Self {
        Self {
            micros: d.as_micros() as u64,
            human: format_duration_human(d),
        }
    }

    fn from_micros(micros: Option<u64>) -> Option<Self> {
        micros.map(|us| Self::from_duration(Duration::from_micros(us)))
    }
}

/// Scan plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonTarget {
    pub path: PathBuf,
    pub file_size: u64,
    pub chunk_count: u64,
    pub mini_chunk_size: u64,
    pub mini_chunks_per_job: u64,
    pub seed: u64,
    pub tail: TailPolicy,
}

/// Job latency percentiles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonLatency {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<JsonDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p50: Option<JsonDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p99: Option<JsonDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<JsonDuration>,
}

/// Counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonJobs {
    pub completed: u64,
    pub failed: u64,
    pub units_processed: u64,
    pub bytes_processed: u64,
    pub per_worker: Vec<u64>,
    pub latency: JsonLatency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonWatchdog {
    pub ticks: u64,
    pub stalled_ticks: u64,
}

/// Moments of the scanned samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonMoments {
    pub count: u64,
    pub skipped: u64,
    pub mean: f64,
    pub variance: Option<f64>,
    pub std_dev: Option<f64>,
    pub skewness: Option<f64>,
    pub kurtosis: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub integer_only: bool,
    pub numerical_error: bool,
}

impl From<&MomentsAccumulator> for JsonMoments {
    fn from(m: &MomentsAccumulator) -> Self {
        Self {
            count: m.count(),
            skipped: m.skipped(),
            mean: m.mean(),
            variance: m.variance(),
            std_dev: m.std_dev(),
            skewness: m.skewness(),
            kurtosis: m.kurtosis(),
            min: m.min(),
            max: m.max(),
            integer_only: m.is_integer_only(),
            numerical_error: m.had_numerical_error(),
        }
    }
}

/// Complete JSON document for one scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonScanOutput {
    pub generated_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub elapsed: JsonDuration,
    pub workers: usize,
    pub target: JsonTarget,
    pub jobs: JsonJobs,
    pub failures: Vec<JsonFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watchdog: Option<JsonWatchdog>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonFailure {
    pub job_id: u64,
    pub units: Vec<u64>,
    pub error: String,
}

impl From<&FailedJob> for JsonFailure {
    fn from(f: &FailedJob) -> Self {
        Self {
            job_id: f.job_id,
            units: f.units.clone(),
            error: f.error.clone(),
        }
    }
}

/// Build the JSON document for `report`, attaching `analysis` if given
pub fn build_output<R>(report: &ScanReport<R>, analysis: Option<serde_json::Value>) -> JsonScanOutput {
    let stats = &report.stats;

    JsonScanOutput {
        generated_at: Utc::now(),
        started_at: report.started_at,
        elapsed: JsonDuration::from_duration(report.elapsed),
        workers: report.workers,
        target: JsonTarget {
            path: report.file_path.clone(),
            file_size: report.file_size,
            chunk_count: report.chunk_count,
            mini_chunk_size: report.mini_chunk_size,
            mini_chunks_per_job: report.mini_chunks_per_job,
            seed: report.seed,
            tail: report.tail,
        },
        jobs: JsonJobs {
            completed: stats.jobs_completed,
            failed: stats.jobs_failed,
            units_processed: stats.units_processed,
            bytes_processed: stats.bytes_processed,
            per_worker: stats.jobs_per_worker.clone(),
            latency: JsonLatency {
                mean: JsonDuration::from_micros(stats.latency_mean_us),
                p50: JsonDuration::from_micros(stats.latency_p50_us),
                p99: JsonDuration::from_micros(stats.latency_p99_us),
                max: JsonDuration::from_micros(stats.latency_max_us),
            },
        },
        failures: report.failures.iter().map(JsonFailure::from).collect(),
        watchdog: report.watchdog.map(|w| JsonWatchdog {
            ticks: w.ticks,
            stalled_ticks: w.stalled_ticks,
        }),
        analysis,
    }
}

/// Write the JSON document to `output_path`
pub fn write_json_output(output_path: &Path, output: &JsonScanOutput, pretty: bool) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON output {}", output_path.display()))?;
    let writer = BufWriter::new(file);

    if pretty {
        serde_json::to_writer_pretty(writer, output)?;
    } else {
        serde_json::to_writer(writer, output)?;
    }

    Ok(())
}

fn format_duration_human(d: Duration) -> String {
    let micros = d.as_micros() as u64;

    if micros == 0 {
        return "0µs".to_string();
    }

    if micros < 1000 {
        format!("{}µs", micros)
    } else if micros < 1_000_000 {
        format!("{:.3}ms", micros as f64 / 1000.0)
    } else if micros < 60_000_000 {
        format!("{:.3}s", micros as f64 / 1_000_000.0)
    } else if micros < 3_600_000_000 {
        format!("{:.2}m", micros as f64 / 60_000_000.0)
    } else {
        format!("{:.2}h", micros as f64 / 3_600_000_000.0)
    }
}
