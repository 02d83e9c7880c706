//! Job construction
//!
//! The job builder owns the sequence generator for a file and slices it into
//! jobs of at most `mini_chunks_per_job` units. Requests are made in two phases:
//! a full-size request first, then, once that overruns, a request for exactly
//! the remaining units. The final job therefore carries the leftover units
//! instead of dropping them.
//!
//! # Example
//!
//! ```
//! use distscan::config::TailPolicy;
//! use distscan::job::builder::JobBuilder;
//!
//! // 5 units of 4 KiB, 2 units per job
//! let mut builder = JobBuilder::new(5 * 4096, 4096, 2, 42, TailPolicy::Truncate);
//! let sizes: Vec<usize> = std::iter::from_fn(|| builder.create_job::<()>())
//!     .map(|job| job.len())
//!     .collect();
//! assert_eq!(sizes, vec![2, 2, 1]);
//! ```

use super::Job;
use crate::config::TailPolicy;
use crate::sequence::SequenceGenerator;
use tracing::debug;

/// Number of addressable units in a file of `file_size` bytes
///
/// With [`TailPolicy::Truncate`] trailing bytes that do not fill a whole unit
/// are never addressed. With [`TailPolicy::Partial`] they form one extra,
/// undersized unit.
pub fn chunk_count(file_size: u64, mini_chunk_size: u64, tail: TailPolicy) -> u64 {
    if mini_chunk_size == 0 {
        return 0;
    }
    let full = file_size / mini_chunk_size;
    match tail {
        TailPolicy::Truncate => full,
        TailPolicy::Partial if file_size % mini_chunk_size != 0 => full + 1,
        TailPolicy::Partial => full,
    }
}

/// Builds jobs from a seeded permutation of a file's units
#[derive(Debug)]
pub struct JobBuilder {
    /// Size of the scanned file in bytes
    file_size: u64,

    /// Bytes per unit
    mini_chunk_size: u64,

    /// Upper bound on units per job
    mini_chunks_per_job: u64,

    /// Total number of units
    chunk_count: u64,

    /// Permutation source
    sequence: SequenceGenerator,

    /// Id assigned to the next job
    next_job_id: u64,
}

impl JobBuilder {
    /// Create a builder for a file of `file_size` bytes
    ///
    /// The permutation over all units is generated here, once.
    pub fn new(
        file_size: u64,
        mini_chunk_size: u64,
        mini_chunks_per_job: u64,
        seed: u64,
        tail: TailPolicy,
    ) -> Self {
        let chunk_count = chunk_count(file_size, mini_chunk_size, tail);
        debug!(
            "job builder: file_size={} mini_chunk_size={} chunk_count={} per_job={} seed={}",
            file_size, mini_chunk_size, chunk_count, mini_chunks_per_job, seed
        );

        Self {
            file_size,
            mini_chunk_size,
            mini_chunks_per_job,
            chunk_count,
            sequence: SequenceGenerator::with_seed(chunk_count, seed),
            next_job_id: 0,
        }
    }

    /// Build the next job, or `None` once every unit has been handed out
    pub fn create_job<R>(&mut self) -> Option<Job<R>> {
        let units = match self.sequence.next(self.mini_chunks_per_job) {
            Ok(units) if !units.is_empty() => units,
            Ok(_) => return None,
            Err(e) if e.is_exhaustion() => {
                let remaining = self.sequence.remaining();
                if remaining == 0 {
                    return None;
                }
                // Cannot overrun: exactly what is left
                self.sequence.next(remaining).ok()?
            }
            Err(_) => return None,
        };

        let job = Job::new(self.next_job_id, units);
        self.next_job_id += 1;
        Some(job)
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn mini_chunk_size(&self) -> u64 {
        self.mini_chunk_size
    }

    pub fn mini_chunks_per_job(&self) -> u64 {
        self.mini_chunks_per_job
    }

    pub fn chunk_count(&self) -> u64 {
        self.chunk_count
    }

    /// Number of jobs this builder will produce in total
    pub fn job_count(&self) -> u64 {
        if self.mini_chunks_per_job == 0 {
            return 0;
        }
        (self.chunk_count + self.mini_chunks_per_job - 1) / self.mini_chunks_per_job
    }

    /// Number of jobs created so far
    pub fn jobs_created(&self) -> u64 {
        self.next_job_id
    }

    /// Whether every unit has been placed into a job
    pub fn is_exhausted(&self) -> bool {
        self.sequence.is_exhausted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn all_jobs(builder: &mut JobBuilder) -> Vec<Job<()>> {
        std::iter::from_fn(|| builder.create_job::<()>()).collect()
    }

    #[test]
    fn test_chunk_count_truncates() {
        assert_eq!(chunk_count(16384, 4096, TailPolicy::Truncate), 4);
        assert_eq!(chunk_count(16385, 4096, TailPolicy::Truncate), 4);
        assert_eq!(chunk_count(4095, 4096, TailPolicy::Truncate), 0);
        assert_eq!(chunk_count(0, 4096, TailPolicy::Truncate), 0);
    }

    #[test]
    fn test_chunk_count_partial_tail() {
        assert_eq!(chunk_count(16384, 4096, TailPolicy::Partial), 4);
        assert_eq!(chunk_count(16385, 4096, TailPolicy::Partial), 5);
        assert_eq!(chunk_count(100, 4096, TailPolicy::Partial), 1);
        assert_eq!(chunk_count(0, 4096, TailPolicy::Partial), 0);
    }

    #[test]
    fn test_builder_exact_multiple() {
        let mut builder = JobBuilder::new(16384, 4096, 2, 42, TailPolicy::Truncate);
        assert_eq!(builder.chunk_count(), 4);
        assert_eq!(builder.job_count(), 2);

        let jobs = all_jobs(&mut builder);
        assert_eq!(jobs.len(), 2);

        let covered: HashSet<u64> = jobs.iter().flat_map(|j| j.units().iter().copied()).collect();
        assert_eq!(covered, (0..4).collect());
        assert!(builder.is_exhausted());
    }

    #[test]
    fn test_builder_keeps_leftover_units() {
        let mut builder = JobBuilder::new(5 * 4096, 4096, 2, 42, TailPolicy::Truncate);
        let jobs = all_jobs(&mut builder);

        let sizes: Vec<usize> = jobs.iter().map(|j| j.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);

        let mut covered: Vec<u64> = jobs.iter().flat_map(|j| j.units().iter().copied()).collect();
        covered.sort_unstable();
        assert_eq!(covered, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_builder_disjoint_cover() {
        for (n, per_job) in [(1u64, 1u64), (1, 7), (37, 5), (64, 8), (1000, 33), (2049, 2048)] {
            let mut builder = JobBuilder::new(n * 512, 512, per_job, 9, TailPolicy::Truncate);
            let jobs = all_jobs(&mut builder);

            let flat: Vec<u64> = jobs.iter().flat_map(|j| j.units().iter().copied()).collect();
            let unique: HashSet<u64> = flat.iter().copied().collect();
            assert_eq!(flat.len() as u64, n, "n={} per_job={}", n, per_job);
            assert_eq!(unique.len() as u64, n);
            assert!(flat.iter().all(|&u| u < n));
            assert!(jobs.iter().all(|j| j.len() as u64 <= per_job));
            assert_eq!(jobs.len() as u64, builder.job_count());
        }
    }

    #[test]
    fn test_builder_job_ids_increase() {
        let mut builder = JobBuilder::new(10 * 4096, 4096, 3, 1, TailPolicy::Truncate);
        let ids: Vec<u64> = all_jobs(&mut builder).iter().map(|j| j.id()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(builder.jobs_created(), 4);
    }

    #[test]
    fn test_builder_stays_exhausted() {
        let mut builder = JobBuilder::new(3 * 4096, 4096, 2, 1, TailPolicy::Truncate);
        assert_eq!(all_jobs(&mut builder).len(), 2);
        for _ in 0..3 {
            assert!(builder.create_job::<()>().is_none());
        }
    }

    #[test]
    fn test_builder_empty_file() {
        let mut builder = JobBuilder::new(100, 4096, 2, 1, TailPolicy::Truncate);
        assert_eq!(builder.chunk_count(), 0);
        assert!(builder.create_job::<()>().is_none());
    }

    #[test]
    fn test_builder_reproducible() {
        let mut a = JobBuilder::new(1000 * 64, 64, 16, 777, TailPolicy::Truncate);
        let mut b = JobBuilder::new(1000 * 64, 64, 16, 777, TailPolicy::Truncate);

        let jobs_a: Vec<Vec<u64>> = all_jobs(&mut a).iter().map(|j| j.units().to_vec()).collect();
        let jobs_b: Vec<Vec<u64>> = all_jobs(&mut b).iter().map(|j| j.units().to_vec()).collect();
        assert_eq!(jobs_a, jobs_b);
    }

    #[test]
    fn test_builder_partial_tail_unit() {
        let mut builder = JobBuilder::new(4 * 4096 + 10, 4096, 2, 5, TailPolicy::Partial);
        assert_eq!(builder.chunk_count(), 5);

        let mut covered: Vec<u64> = all_jobs(&mut builder)
            .iter()
            .flat_map(|j| j.units().iter().copied())
            .collect();
        covered.sort_unstable();
        assert_eq!(covered, vec![0, 1, 2, 3, 4]);
    }
}
