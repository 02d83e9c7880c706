//! Worker threads
//!
//! Each worker is a long-lived thread plus a handle owned by the scheduler.
//! The handle carries the worker's state machine:
//!
//! ```text
//!   Idle ──assign(job)──▶ Busy ──completion received──▶ Idle
//! ```
//!
//! Jobs move to the thread over a bounded channel of capacity one, and come
//! back, result recorded, over a completion channel shared by the whole pool.
//! Ownership of a job is therefore always with exactly one party: the
//! scheduler before assignment and after completion, the worker thread while
//! the job is processed.
//!
//! # Failure handling
//!
//! Read errors, analyzer errors and analyzer panics are all caught on the
//! worker thread and recorded as [`JobOutcome::Failed`]. A single bad read
//! never takes the pool down, and the scheduler always gets its completion.
//!
//! # Example
//!
//! ```no_run
//! use distscan::analysis::moments::MomentsAnalyzer;
//! use distscan::config::TailPolicy;
//! use distscan::job::Job;
//! use distscan::reader::ChunkReader;
//! use distscan::worker::Worker;
//! use crossbeam::channel::unbounded;
//! use std::sync::Arc;
//!
//! let reader = ChunkReader::open("/data/samples.bin", 4096, TailPolicy::Truncate)?;
//! let (done_tx, done_rx) = unbounded();
//! let mut worker = Worker::spawn(0, reader, Arc::new(MomentsAnalyzer), done_tx)?;
//!
//! worker.assign(Job::new(0, vec![3, 1, 2]))?;
//! let completion = done_rx.recv()?;
//! worker.complete();
//!
//! println!("job {} -> {:?}", completion.job.id(), completion.job.outcome());
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::analysis::Analyzer;
use crate::error::ScanError;
use crate::job::{Job, JobFailure, JobOutcome};
use crate::reader::ChunkReader;
use anyhow::Context;
use crossbeam::channel::{bounded, Receiver, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Worker availability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting for a job
    Idle,
    /// Processing the job with this id
    Busy { job_id: u64 },
}

/// A processed job on its way back to the scheduler
#[derive(Debug)]
pub struct Completion<R> {
    /// Worker that processed the job
    pub worker_id: usize,
    /// The job, with its result slot written
    pub job: Job<R>,
    /// Bytes read for the job
    pub bytes: u64,
    /// Wall time spent on the job
    pub elapsed: Duration,
}

/// Read every unit of `job` in job order, run the analyzer on the
/// concatenated bytes, and record the outcome in the job
///
/// Returns the number of bytes read.
///
/// # Errors
///
/// Only [`ScanError::ResultAlreadyRecorded`]; everything else becomes a failed outcome.
pub fn process_job<A: Analyzer>(
    reader: &ChunkReader,
    analyzer: &A,
    job: &mut Job<A::Output>,
) -> Result<u64, ScanError> {
    let mut buf = Vec::with_capacity(job.len() * reader.mini_chunk_size() as usize);

    let read = job.units().iter().try_for_each(|&unit| {
        reader
            .read_unit_into(unit, &mut buf)
            .with_context(|| format!("Failed to read unit {} of job {}", unit, job.id()))
    });

    let outcome = match read {
        Ok(()) => run_analyzer(analyzer, &buf, job.id()),
        Err(e) => JobOutcome::Failed(JobFailure::from_error(&e)),
    };

    job.record(outcome)?;
    Ok(buf.len() as u64)
}

fn run_analyzer<A: Analyzer>(analyzer: &A, bytes: &[u8], job_id: u64) -> JobOutcome<A::Output> {
    match catch_unwind(AssertUnwindSafe(|| analyzer.analyze(bytes))) {
        Ok(Ok(result)) => JobOutcome::Completed(result),
        Ok(Err(e)) => {
            let e = e.context(format!("Analysis of job {} failed", job_id));
            JobOutcome::Failed(JobFailure::from_error(&e))
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            JobOutcome::Failed(JobFailure::new(format!(
                "Analyzer panicked on job {}: {}",
                job_id, message
            )))
        }
    }
}

/// Body of a worker thread: process jobs until the job channel closes
fn worker_main<A: Analyzer>(
    id: usize,
    reader: ChunkReader,
    analyzer: Arc<A>,
    jobs: Receiver<Job<A::Output>>,
    done: Sender<Completion<A::Output>>,
) {
    debug!("worker {} started", id);

    for mut job in jobs {
        let start = Instant::now();
        let bytes = match process_job(&reader, analyzer.as_ref(), &mut job) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("worker {}: {}", id, e);
                0
            }
        };

        if let Some(JobOutcome::Failed(failure)) = job.outcome() {
            warn!("worker {}: job {} failed: {}", id, job.id(), failure.error);
        }

        let completion = Completion {
            worker_id: id,
            job,
            bytes,
            elapsed: start.elapsed(),
        };
        if done.send(completion).is_err() {
            // Scheduler is gone, nobody left to report to
            break;
        }
    }

    debug!("worker {} exiting", id);
}

/// Scheduler-side handle of one worker thread
pub struct Worker<A: Analyzer> {
    id: usize,
    state: WorkerState,
    job_tx: Option<Sender<Job<A::Output>>>,
    handle: Option<JoinHandle<()>>,
}

impl<A: Analyzer> Worker<A> {
    /// Spawn the worker thread
    ///
    /// Completions are sent on `done_tx`; the thread exits when the handle is
    /// shut down or dropped.
    pub fn spawn(
        id: usize,
        reader: ChunkReader,
        analyzer: Arc<A>,
        done_tx: Sender<Completion<A::Output>>,
    ) -> crate::Result<Self> {
        let (job_tx, job_rx) = bounded(1);

        let handle = std::thread::Builder::new()
            .name(format!("distscan-worker-{}", id))
            .spawn(move || worker_main(id, reader, analyzer, job_rx, done_tx))
            .with_context(|| format!("Failed to spawn worker thread {}", id))?;

        Ok(Self {
            id,
            state: WorkerState::Idle,
            job_tx: Some(job_tx),
            handle: Some(handle),
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == WorkerState::Idle
    }

    /// Hand a job to the worker thread
    ///
    /// # Errors
    ///
    /// - [`ScanError::WorkerBusy`] if the worker still holds a job
    /// - [`ScanError::ResultAlreadyRecorded`] if the job was already processed
    /// - [`ScanError::WorkerDisconnected`] if the thread has exited
    pub fn assign(&mut self, job: Job<A::Output>) -> Result<(), ScanError> {
        if !self.is_idle() {
            return Err(ScanError::WorkerBusy { worker_id: self.id });
        }
        if job.outcome().is_some() {
            return Err(ScanError::ResultAlreadyRecorded { job_id: job.id() });
        }

        let job_id = job.id();
        let sender = self
            .job_tx
            .as_ref()
            .ok_or(ScanError::WorkerDisconnected { in_flight: 0 })?;
        sender
            .send(job)
            .map_err(|_| ScanError::WorkerDisconnected { in_flight: 1 })?;

        self.state = WorkerState::Busy { job_id };
        Ok(())
    }

    /// Return the worker to `Idle` after its completion was received
    pub fn complete(&mut self) {
        self.state = WorkerState::Idle;
    }

    /// Close the job channel and wait for the thread to finish its current job
    pub fn shutdown(&mut self) -> crate::Result<()> {
        self.job_tx.take();
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| anyhow::anyhow!("Worker thread {} panicked", self.id))?;
        }
        Ok(())
    }
}

impl<A: Analyzer> Drop for Worker<A> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("{:#}", e);
        }
    }
}
