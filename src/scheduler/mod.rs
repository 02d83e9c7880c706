//! Scan scheduler
//!
//! The scheduler is the only owner of the job builder, the completion tracker,
//! the statistics and the worker handles. Workers never touch shared state;
//! they receive a job, send it back with its result, and the scheduler applies
//! the effects. This keeps every invariant checkable in one place.
//!
//! # Lifecycle
//!
//! ```text
//!   Running ──builder exhausted──▶ Draining ──no jobs in flight──▶ Done
//! ```
//!
//! - **Running**: build the next job, wait for an idle worker (blocking on
//!   completions while every worker is busy), assign it.
//! - **Draining**: no jobs left to build; collect outstanding completions.
//! - **Done**: every unit must be marked exactly once, otherwise the scan
//!   fails with [`ScanError::IncompleteCoverage`].
//!
//! A job whose read or analysis failed still completes its units; the failure
//! is kept in [`ScanReport::failures`] and logged. Failed jobs are not retried.

use crate::analysis::Analyzer;
use crate::config::validator::validate_config;
use crate::config::{Config, TailPolicy};
use crate::error::ScanError;
use crate::job::builder::JobBuilder;
use crate::job::{Job, JobOutcome};
use crate::reader::ChunkReader;
use crate::stats::{ScanStats, StatsSummary};
use crate::tracker::CompletionTracker;
use crate::watchdog::{Watchdog, WatchdogReport};
use crate::worker::{Completion, Worker};
use anyhow::Context;
use chrono::{DateTime, Utc};
use crossbeam::channel::{unbounded, Receiver};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Scheduler lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    /// Jobs are still being built and assigned
    Running,
    /// All jobs assigned, waiting for the last completions
    Draining,
    /// Every unit accounted for
    Done,
}

/// A job that completed with a failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedJob {
    pub job_id: u64,
    pub units: Vec<u64>,
    pub error: String,
}

/// Everything a finished scan produced
#[derive(Debug)]
pub struct ScanReport<R> {
    /// Scanned file
    pub file_path: PathBuf,

    /// File size in bytes
    pub file_size: u64,

    /// Number of addressable units
    pub chunk_count: u64,

    /// Bytes per unit
    pub mini_chunk_size: u64,

    /// Upper bound on units per job
    pub mini_chunks_per_job: u64,

    /// Permutation seed
    pub seed: u64,

    /// Trailing bytes policy
    pub tail: TailPolicy,

    /// Worker threads used
    pub workers: usize,

    /// Every job, in completion order, with its recorded outcome
    pub jobs: Vec<Job<R>>,

    /// Jobs whose outcome is a failure
    pub failures: Vec<FailedJob>,

    /// Counters and latency distribution
    pub stats: StatsSummary,

    /// Progress watchdog observations, if it ran
    pub watchdog: Option<WatchdogReport>,

    /// Wall-clock start of the scan
    pub started_at: DateTime<Utc>,

    /// Scan duration
    pub elapsed: Duration,
}

impl<R> ScanReport<R> {
    /// Results of the jobs that completed successfully
    pub fn results(&self) -> impl Iterator<Item = &R> {
        self.jobs.iter().filter_map(|job| match job.outcome() {
            Some(JobOutcome::Completed(result)) => Some(result),
            _ => None,
        })
    }

    /// Whether every job completed without a failure
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Units belonging to failed jobs
    pub fn failed_units(&self) -> u64 {
        self.failures.iter().map(|f| f.units.len() as u64).sum()
    }
}

/// Drives one scan of one file
pub struct Scheduler<A: Analyzer> {
    state: SchedulerState,
    path: PathBuf,
    file_size: u64,
    seed: u64,
    tail: TailPolicy,
    builder: JobBuilder,
    tracker: CompletionTracker,
    stats: ScanStats,
    workers: Vec<Worker<A>>,
    done_rx: Receiver<Completion<A::Output>>,
    in_flight: usize,
    jobs: Vec<Job<A::Output>>,
    failures: Vec<FailedJob>,
    watchdog_interval: Option<Duration>,
}

impl<A: Analyzer> Scheduler<A> {
    /// Open `path`, build the job plan and start the worker pool
    ///
    /// The worker pool is capped at the number of jobs, with at least one worker.
    pub fn new(path: impl AsRef<Path>, config: &Config, analyzer: A) -> crate::Result<Self> {
        validate_config(config)?;

        let path = path.as_ref().to_path_buf();
        let chunking = &config.chunking;
        let reader = ChunkReader::open(&path, chunking.mini_chunk_size, chunking.tail)
            .with_context(|| format!("Failed to open scan target {}", path.display()))?;

        let builder = JobBuilder::new(
            reader.file_size(),
            chunking.mini_chunk_size,
            config.mini_chunks_per_job(),
            config.workers.seed,
            chunking.tail,
        );
        let tracker = CompletionTracker::new(builder.chunk_count());

        let num_workers = config
            .workers
            .threads
            .min(usize::try_from(builder.job_count()).unwrap_or(usize::MAX))
            .max(1);

        let analyzer = Arc::new(analyzer);
        let (done_tx, done_rx) = unbounded();
        let workers = (0..num_workers)
            .map(|id| Worker::spawn(id, reader.clone(), analyzer.clone(), done_tx.clone()))
            .collect::<crate::Result<Vec<_>>>()?;
        // Only workers hold senders, so a closed channel means they are all gone
        drop(done_tx);

        let watchdog_interval = (!config.runtime.no_watchdog)
            .then(|| Duration::from_millis(config.runtime.watchdog_interval_ms));

        info!(
            "scan plan: {} ({} bytes), {} units of {} bytes, {} jobs of up to {} units, {} workers, seed {}",
            path.display(),
            reader.file_size(),
            builder.chunk_count(),
            chunking.mini_chunk_size,
            builder.job_count(),
            builder.mini_chunks_per_job(),
            num_workers,
            config.workers.seed
        );

        Ok(Self {
            state: SchedulerState::Running,
            path,
            file_size: reader.file_size(),
            seed: config.workers.seed,
            tail: chunking.tail,
            stats: ScanStats::new(num_workers),
            builder,
            tracker,
            workers,
            done_rx,
            in_flight: 0,
            jobs: Vec::new(),
            failures: Vec::new(),
            watchdog_interval,
        })
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn chunk_count(&self) -> u64 {
        self.builder.chunk_count()
    }

    /// Jobs the scan will produce
    pub fn job_count(&self) -> u64 {
        self.builder.job_count()
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Run the scan to completion
    ///
    /// # Errors
    ///
    /// Invariant violations ([`ScanError::is_invariant_violation`]) and a
    /// collapsed worker pool abort the scan. Per-job I/O and analysis failures
    /// do not; they are reported in [`ScanReport::failures`].
    pub fn run(mut self) -> crate::Result<ScanReport<A::Output>> {
        let started_at = Utc::now();
        let start = Instant::now();
        let watchdog = self.watchdog_interval.map(Watchdog::start).transpose()?;

        while self.state != SchedulerState::Done {
            match self.state {
                SchedulerState::Running => self.step_running(watchdog.as_ref())?,
                SchedulerState::Draining => self.step_draining(watchdog.as_ref())?,
                SchedulerState::Done => {}
            }
        }

        let elapsed = start.elapsed();
        for worker in &mut self.workers {
            worker.shutdown()?;
        }
        let watchdog = watchdog.map(Watchdog::stop);

        info!(
            "scan finished in {:.3}s: {} jobs, {} failed, {} units",
            elapsed.as_secs_f64(),
            self.jobs.len(),
            self.failures.len(),
            self.tracker.completed()
        );

        Ok(ScanReport {
            file_path: self.path,
            file_size: self.file_size,
            chunk_count: self.builder.chunk_count(),
            mini_chunk_size: self.builder.mini_chunk_size(),
            mini_chunks_per_job: self.builder.mini_chunks_per_job(),
            seed: self.seed,
            tail: self.tail,
            workers: self.workers.len(),
            jobs: self.jobs,
            failures: self.failures,
            stats: self.stats.summary(),
            watchdog,
            started_at,
            elapsed,
        })
    }

    fn step_running(&mut self, watchdog: Option<&Watchdog>) -> crate::Result<()> {
        let Some(job) = self.builder.create_job() else {
            info!(
                "all {} jobs dispatched, draining {} in flight",
                self.builder.jobs_created(),
                self.in_flight
            );
            self.transition(SchedulerState::Draining);
            return Ok(());
        };

        let worker = self.acquire_idle_worker(watchdog)?;
        debug!("job {} ({} units) -> worker {}", job.id(), job.len(), worker);
        self.workers[worker].assign(job)?;
        self.in_flight += 1;
        Ok(())
    }

    fn step_draining(&mut self, watchdog: Option<&Watchdog>) -> crate::Result<()> {
        if self.in_flight > 0 {
            return self.wait_for_completion(watchdog);
        }

        if !self.tracker.is_done() {
            return Err(ScanError::IncompleteCoverage {
                done: self.tracker.completed(),
                total: self.tracker.chunk_count(),
            }
            .into());
        }
        self.transition(SchedulerState::Done);
        Ok(())
    }

    fn transition(&mut self, next: SchedulerState) {
        debug!("scheduler {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Index of an idle worker, blocking on completions while none is
    fn acquire_idle_worker(&mut self, watchdog: Option<&Watchdog>) -> crate::Result<usize> {
        loop {
            if let Some(idx) = self.workers.iter().position(|w| w.is_idle()) {
                return Ok(idx);
            }
            self.wait_for_completion(watchdog)?;
        }
    }

    fn wait_for_completion(&mut self, watchdog: Option<&Watchdog>) -> crate::Result<()> {
        let completion = self.done_rx.recv().map_err(|_| ScanError::WorkerDisconnected {
            in_flight: self.in_flight,
        })?;
        self.apply_completion(completion, watchdog)
    }

    fn apply_completion(
        &mut self,
        completion: Completion<A::Output>,
        watchdog: Option<&Watchdog>,
    ) -> crate::Result<()> {
        let Completion {
            worker_id,
            job,
            bytes,
            elapsed,
        } = completion;

        let worker = self
            .workers
            .get_mut(worker_id)
            .with_context(|| format!("Completion from unknown worker {}", worker_id))?;
        worker.complete();
        self.in_flight = self.in_flight.saturating_sub(1);

        let failure = match job.outcome() {
            Some(JobOutcome::Completed(_)) => None,
            Some(JobOutcome::Failed(failure)) => Some(failure.error.clone()),
            None => anyhow::bail!("Job {} came back from worker {} without a result", job.id(), worker_id),
        };

        for &unit in job.units() {
            if failure.is_some() {
                self.tracker.mark_failed(unit)?;
            } else {
                self.tracker.mark_complete(unit)?;
            }
        }

        self.stats
            .record_job(worker_id, job.len() as u64, bytes, elapsed, failure.is_some());
        if let Some(watchdog) = watchdog {
            watchdog.record(bytes);
        }

        if let Some(error) = failure {
            warn!("job {} failed: {}", job.id(), error);
            self.failures.push(FailedJob {
                job_id: job.id(),
                units: job.units().to_vec(),
                error,
            });
        }

        debug!(
            "job {} done on worker {} in {:?}, {}/{} units",
            job.id(),
            worker_id,
            elapsed,
            self.tracker.completed(),
            self.tracker.chunk_count()
        );
        self.jobs.push(job);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    struct Length;

    impl Analyzer for Length {
        type Output = usize;

        fn analyze(&self, bytes: &[u8]) -> anyhow::Result<usize> {
            Ok(bytes.len())
        }
    }

    fn config(chunk: u64, per_job: u64, threads: usize) -> Config {
        let mut config = Config::default();
        config.chunking.mini_chunk_size = chunk;
        config.chunking.mini_chunks_per_job = Some(per_job);
        config.workers.threads = threads;
        config.runtime.no_watchdog = true;
        config
    }

    fn file_of(dir: &TempDir, len: usize) -> PathBuf {
        let path = dir.path().join("scan.bin");
        std::fs::write(&path, vec![0xA5u8; len]).unwrap();
        path
    }

    #[test]
    fn test_scheduler_starts_running() {
        let dir = TempDir::new().unwrap();
        let path = file_of(&dir, 4096 * 4);
        let scheduler = Scheduler::new(&path, &config(4096, 2, 8), Length).unwrap();

        assert_eq!(scheduler.state(), SchedulerState::Running);
        assert_eq!(scheduler.chunk_count(), 4);
        assert_eq!(scheduler.job_count(), 2);
        // Pool capped at the number of jobs
        assert_eq!(scheduler.num_workers(), 2);
    }

    #[test]
    fn test_scheduler_covers_every_unit_once() {
        let dir = TempDir::new().unwrap();
        let path = file_of(&dir, 512 * 37);
        let report = Scheduler::new(&path, &config(512, 4, 3), Length)
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(report.chunk_count, 37);
        assert_eq!(report.jobs.len(), 10);
        assert!(report.is_clean());

        let mut seen = HashSet::new();
        for job in &report.jobs {
            for &unit in job.units() {
                assert!(seen.insert(unit), "unit {} scanned twice", unit);
            }
        }
        assert_eq!(seen.len(), 37);
        assert_eq!(report.results().sum::<usize>(), 512 * 37);
        assert_eq!(report.stats.units_processed, 37);
        assert_eq!(report.stats.jobs_per_worker.iter().sum::<u64>(), 10);
    }

    #[test]
    fn test_scheduler_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = file_of(&dir, 100);
        let report = Scheduler::new(&path, &config(4096, 2, 4), Length)
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(report.chunk_count, 0);
        assert!(report.jobs.is_empty());
        assert_eq!(report.workers, 1);
    }

    #[test]
    fn test_scheduler_rejects_invalid_config() {
        let dir = TempDir::new().unwrap();
        let path = file_of(&dir, 4096);
        assert!(Scheduler::new(&path, &config(4096, 0, 1), Length).is_err());
        assert!(Scheduler::new(&path, &config(0, 1, 1), Length).is_err());
        assert!(Scheduler::new(&path, &config(4096, 1, 0), Length).is_err());
    }

    #[test]
    fn test_scheduler_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = Scheduler::new(dir.path().join("nope.bin"), &config(4096, 1, 1), Length)
            .err()
            .unwrap();
        assert!(format!("{:#}", err).contains("nope.bin"));
    }

    #[test]
    fn test_scheduler_with_watchdog() {
        let dir = TempDir::new().unwrap();
        let path = file_of(&dir, 4096 * 8);
        let mut config = config(4096, 2, 2);
        config.runtime.no_watchdog = false;
        config.runtime.watchdog_interval_ms = 3_600_000;

        let report = Scheduler::new(&path, &config, Length).unwrap().run().unwrap();
        assert_eq!(report.jobs.len(), 4);
        assert_eq!(report.watchdog, Some(WatchdogReport::default()));
    }
}
