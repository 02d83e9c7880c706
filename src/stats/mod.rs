//! Scan statistics
//!
//! Counters for completed and failed jobs, units and bytes processed, jobs per
//! worker, and an HdrHistogram of per-job processing latency. Owned and updated
//! by the scheduler only, so no atomics are needed here.
//!
//! # Example
//!
//! ```
//! use distscan::stats::ScanStats;
//! use std::time::Duration;
//!
//! let mut stats = ScanStats::new(2);
//! stats.record_job(0, 2, 8192, Duration::from_millis(3), false);
//! stats.record_job(1, 1, 4096, Duration::from_millis(5), true);
//!
//! assert_eq!(stats.jobs_completed(), 1);
//! assert_eq!(stats.jobs_failed(), 1);
//! assert_eq!(stats.bytes_processed(), 12288);
//! ```

use hdrhistogram::Histogram;
use serde::Serialize;
use std::time::Duration;

/// Upper bound for recorded job latency (1 hour in microseconds)
const MAX_LATENCY_US: u64 = 3_600_000_000;

/// Job processing latency histogram
///
/// Tracks latencies from 1µs to 1 hour with 3 significant digits.
#[derive(Debug, Clone)]
pub struct JobLatencyHistogram {
    histogram: Histogram<u64>,
}

impl JobLatencyHistogram {
    pub fn new() -> Self {
        let histogram = Histogram::new_with_bounds(1, MAX_LATENCY_US, 3)
            .expect("Failed to create histogram with valid bounds");
        Self { histogram }
    }

    /// Record a latency sample, clamped to the histogram's range
    #[inline]
    pub fn record(&mut self, latency: Duration) {
        let micros = latency.as_micros() as u64;
        let value = micros.clamp(1, MAX_LATENCY_US);
        let _ = self.histogram.record(value);
    }

    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histogram.is_empty()
    }

    /// Latency at `percentile` (0.0 - 100.0), `None` when empty
    pub fn percentile(&self, percentile: f64) -> Option<Duration> {
        if self.histogram.is_empty() {
            return None;
        }
        Some(Duration::from_micros(self.histogram.value_at_percentile(percentile)))
    }

    pub fn max(&self) -> Option<Duration> {
        if self.histogram.is_empty() {
            return None;
        }
        Some(Duration::from_micros(self.histogram.max()))
    }

    pub fn mean(&self) -> Option<Duration> {
        if self.histogram.is_empty() {
            return None;
        }
        Some(Duration::from_micros(self.histogram.mean() as u64))
    }
}

impl Default for JobLatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate statistics for one scan
#[derive(Debug, Clone)]
pub struct ScanStats {
    jobs_completed: u64,
    jobs_failed: u64,
    units_processed: u64,
    bytes_processed: u64,
    jobs_per_worker: Vec<u64>,
    latency: JobLatencyHistogram,
}

impl ScanStats {
    /// Create empty statistics for a pool of `num_workers`
    pub fn new(num_workers: usize) -> Self {
        Self {
            jobs_completed: 0,
            jobs_failed: 0,
            units_processed: 0,
            bytes_processed: 0,
            jobs_per_worker: vec![0; num_workers],
            latency: JobLatencyHistogram::new(),
        }
    }

    /// Record one finished job
    pub fn record_job(&mut self, worker_id: usize, units: u64, bytes: u64, elapsed: Duration, failed: bool) {
        if failed {
            self.jobs_failed += 1;
        } else {
            self.jobs_completed += 1;
        }
        self.units_processed += units;
        self.bytes_processed += bytes;
        if let Some(count) = self.jobs_per_worker.get_mut(worker_id) {
            *count += 1;
        }
        self.latency.record(elapsed);
    }

    pub fn jobs_completed(&self) -> u64 {
        self.jobs_completed
    }

    pub fn jobs_failed(&self) -> u64 {
        self.jobs_failed
    }

    /// Completed plus failed
    pub fn jobs_total(&self) -> u64 {
        self.jobs_completed + self.jobs_failed
    }

    pub fn units_processed(&self) -> u64 {
        self.units_processed
    }

    pub fn bytes_processed(&self) -> u64 {
        self.bytes_processed
    }

    pub fn jobs_per_worker(&self) -> &[u64] {
        &self.jobs_per_worker
    }

    pub fn latency(&self) -> &JobLatencyHistogram {
        &self.latency
    }

    /// Serializable snapshot for reports
    pub fn summary(&self) -> StatsSummary {
        let micros = |d: Option<Duration>| d.map(|d| d.as_micros() as u64);
        StatsSummary {
            jobs_completed: self.jobs_completed,
            jobs_failed: self.jobs_failed,
            units_processed: self.units_processed,
            bytes_processed: self.bytes_processed,
            jobs_per_worker: self.jobs_per_worker.clone(),
            latency_mean_us: micros(self.latency.mean()),
            latency_p50_us: micros(self.latency.percentile(50.0)),
            latency_p99_us: micros(self.latency.percentile(99.0)),
            latency_max_us: micros(self.latency.max()),
        }
    }
}

/// Plain-data view of [`ScanStats`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSummary {
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub units_processed: u64,
    pub bytes_processed: u64,
    pub jobs_per_worker: Vec<u64>,
    pub latency_mean_us: Option<u64>,
    pub latency_p50_us: Option<u64>,
    pub latency_p99_us: Option<u64>,
    pub latency_max_us: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_empty() {
        let hist = JobLatencyHistogram::new();
        assert!(hist.is_empty());
        assert!(hist.percentile(50.0).is_none());
        assert!(hist.max().is_none());
    }

    #[test]
    fn test_histogram_percentiles() {
        let mut hist = JobLatencyHistogram::new();
        for ms in 1..=100 {
            hist.record(Duration::from_millis(ms));
        }

        assert_eq!(hist.len(), 100);
        let p50 = hist.percentile(50.0).unwrap();
        assert!(p50 >= Duration::from_millis(49) && p50 <= Duration::from_millis(51));
        let max = hist.max().unwrap();
        assert!(max >= Duration::from_millis(99) && max <= Duration::from_millis(101));
    }

    #[test]
    fn test_histogram_clamps_zero() {
        let mut hist = JobLatencyHistogram::new();
        hist.record(Duration::ZERO);
        assert_eq!(hist.len(), 1);
    }

    #[test]
    fn test_stats_per_worker() {
        let mut stats = ScanStats::new(3);
        stats.record_job(0, 4, 16384, Duration::from_micros(100), false);
        stats.record_job(2, 4, 16384, Duration::from_micros(200), false);
        stats.record_job(2, 1, 4096, Duration::from_micros(300), true);
        // Unknown worker ids are counted in totals only
        stats.record_job(9, 1, 4096, Duration::from_micros(50), false);

        assert_eq!(stats.jobs_per_worker(), &[1, 0, 2]);
        assert_eq!(stats.jobs_total(), 4);
        assert_eq!(stats.units_processed(), 10);

        let summary = stats.summary();
        assert_eq!(summary.jobs_completed, 3);
        assert_eq!(summary.jobs_failed, 1);
        assert!(summary.latency_p99_us.is_some());
    }
}
