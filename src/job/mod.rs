//! Jobs
//!
//! A job is an ordered batch of unit indices handed to one worker at a time,
//! plus a result slot the worker fills in exactly once.
//!
//! The unit order inside a job is the (randomized) order produced by the
//! sequence generator. Workers must preserve it when concatenating bytes.

pub mod builder;

use crate::error::ScanError;
use serde::Serialize;

/// Why a job could not produce a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobFailure {
    /// Human-readable error chain
    pub error: String,
}

impl JobFailure {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }

    /// Build a failure from an error, keeping its full cause chain
    pub fn from_error(err: &anyhow::Error) -> Self {
        Self::new(format!("{:#}", err))
    }
}

/// Outcome written into a job by the worker that processed it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum JobOutcome<R> {
    /// The analyzer returned a result
    Completed(R),
    /// Reading or analysis failed; the units still count as visited
    Failed(JobFailure),
}

impl<R> JobOutcome<R> {
    pub fn is_failed(&self) -> bool {
        matches!(self, JobOutcome::Failed(_))
    }
}

/// A bounded batch of unit indices plus its result slot
#[derive(Debug, Clone, Serialize)]
pub struct Job<R> {
    id: u64,
    units: Vec<u64>,
    outcome: Option<JobOutcome<R>>,
}

impl<R> Job<R> {
    pub fn new(id: u64, units: Vec<u64>) -> Self {
        Self {
            id,
            units,
            outcome: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Unit indices in processing order
    pub fn units(&self) -> &[u64] {
        &self.units
    }

    /// Number of units in the job
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Recorded outcome, `None` until a worker has processed the job
    pub fn outcome(&self) -> Option<&JobOutcome<R>> {
        self.outcome.as_ref()
    }

    /// Take the outcome out, leaving the slot empty
    pub fn into_outcome(self) -> Option<JobOutcome<R>> {
        self.outcome
    }

    /// Write the result slot
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::ResultAlreadyRecorded`] if the slot was already written.
    pub fn record(&mut self, outcome: JobOutcome<R>) -> Result<(), ScanError> {
        if self.outcome.is_some() {
            return Err(ScanError::ResultAlreadyRecorded { job_id: self.id });
        }
        self.outcome = Some(outcome);
        Ok(())
    }
}
