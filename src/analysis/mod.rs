//! Analysis collaborator interface
//!
//! The scanning core never computes statistics itself. Each worker hands the
//! concatenated bytes of a job to an [`Analyzer`] and records whatever comes
//! back as that job's result. The core treats the analyzer as `bytes -> Result`.
//!
//! [`moments::MomentsAnalyzer`] is a reference implementation that accumulates
//! the first four moments of the little-endian f64 samples in a job.
//!
//! # Example
//!
//! ```
//! use distscan::analysis::Analyzer;
//!
//! /// Counts bytes, ignoring their value
//! struct ByteCounter;
//!
//! impl Analyzer for ByteCounter {
//!     type Output = usize;
//!
//!     fn analyze(&self, bytes: &[u8]) -> anyhow::Result<usize> {
//!         Ok(bytes.len())
//!     }
//! }
//!
//! assert_eq!(ByteCounter.analyze(&[0u8; 16]).unwrap(), 16);
//! ```

pub mod moments;

/// Per-job analysis of raw bytes
///
/// One analyzer instance is shared by every worker thread, so implementations
/// must be `Sync`. Errors are recorded as a failed job; they do not stop the scan.
pub trait Analyzer: Send + Sync + 'static {
    /// Opaque per-job result
    type Output: Send + 'static;

    /// Analyze the bytes of one job, concatenated in job order
    fn analyze(&self, bytes: &[u8]) -> anyhow::Result<Self::Output>;
}

impl<A: Analyzer> Analyzer for std::sync::Arc<A> {
    type Output = A::Output;

    fn analyze(&self, bytes: &[u8]) -> anyhow::Result<Self::Output> {
        (**self).analyze(bytes)
    }
}
