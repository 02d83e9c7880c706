//! Error taxonomy
//!
//! Errors fall into three classes, which callers treat very differently:
//!
//! - **Exhaustion** (`OutOfRange`): the expected terminal signal of the sequence
//!   generator. Drives state transitions; never logged as an error.
//! - **Invariant violations** (`DoubleCompletion`, `WorkerBusy`, ...): the
//!   single-owner discipline of the scheduler was broken. Fatal.
//! - **I/O failures** (`ShortRead`, `Io`): reported per job. The scan continues.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the scanning core
#[derive(Debug, Error)]
pub enum ScanError {
    /// Sequence generator cannot serve the requested slice
    #[error("sequence exhausted: requested {requested} units, {remaining} remaining")]
    OutOfRange { requested: u64, remaining: u64 },

    /// A unit was marked complete twice
    #[error("unit {unit} was already marked complete")]
    DoubleCompletion { unit: u64 },

    /// A unit index outside of `[0, chunk_count)`
    #[error("unit {unit} is out of bounds (chunk count {chunk_count})")]
    UnitOutOfBounds { unit: u64, chunk_count: u64 },

    /// A job was handed to a worker that is still processing another one
    #[error("worker {worker_id} is busy")]
    WorkerBusy { worker_id: usize },

    /// A job's result slot was written more than once
    #[error("result for job {job_id} was already recorded")]
    ResultAlreadyRecorded { job_id: u64 },

    /// The file ended before a full unit could be read
    #[error("short read at unit {unit}: expected {expected} bytes, got {actual}")]
    ShortRead { unit: u64, expected: usize, actual: usize },

    /// Underlying file operation failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Scheduler finished but not every unit was accounted for
    #[error("scan finished with {done} of {total} units complete")]
    IncompleteCoverage { done: u64, total: u64 },

    /// All worker threads went away while jobs were still outstanding
    #[error("worker pool disconnected with {in_flight} jobs in flight")]
    WorkerDisconnected { in_flight: usize },
}

impl ScanError {
    /// Whether this is the expected "nothing left" signal rather than a failure
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, ScanError::OutOfRange { .. })
    }

    /// Whether this indicates broken scheduler discipline
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            ScanError::DoubleCompletion { .. }
                | ScanError::UnitOutOfBounds { .. }
                | ScanError::WorkerBusy { .. }
                | ScanError::ResultAlreadyRecorded { .. }
                | ScanError::IncompleteCoverage { .. }
        )
    }
}
